use fairq_wire::Datagram;

use crate::{table::FlowTable, Admission, Discipline, Fairness, FlowSnapshot};

#[derive(Debug, Clone, Copy)]
struct Deficit {
    /// Bytes added per visit: base quantum × weight.
    quantum: u32,
    /// Bytes this flow may still send in the current visit.
    deficit: u32,
}

/// Deficit round robin.
///
/// An index cycles over the flows that currently have queued datagrams, in first-seen order.
/// The first call of a visit tops up the flow's deficit by its quantum, unless the deficit
/// already reached the quantum, in which case it is reset to zero. Every call of the visit then
/// releases the head datagram if it fits in the deficit. Once it does not (or the queue is
/// empty) the index moves on and the call returns `None`; the caller is expected to retry.
#[derive(Debug)]
pub struct DeficitRoundRobin {
    table: FlowTable<Deficit>,
    base_quantum: u32,
    /// Index into the list of active flows.
    index: usize,
    /// The flow whose visit is in progress, if any.
    visiting: Option<u32>,
}

impl DeficitRoundRobin {
    /// Creates a scheduler with per-flow queues of `flow_capacity` datagrams and a quantum of
    /// `base_quantum × weight` bytes.
    pub fn new(flow_capacity: usize, base_quantum: u32) -> Self {
        Self { table: FlowTable::new(flow_capacity), base_quantum, index: 0, visiting: None }
    }

    #[inline]
    fn quantum(&self, weight: u32) -> u32 {
        self.base_quantum.saturating_mul(weight)
    }
}

impl Discipline for DeficitRoundRobin {
    fn enqueue(&mut self, datagram: Datagram) -> Admission {
        let base_quantum = self.base_quantum;
        self.table
            .enqueue(datagram, |weight| Deficit {
                quantum: base_quantum.saturating_mul(weight),
                deficit: 0,
            })
            .into()
    }

    fn dequeue_next(&mut self) -> Option<Datagram> {
        let active = self.table.active_positions();
        if active.is_empty() {
            self.visiting = None;
            return None;
        }

        self.index %= active.len();
        let flow = self.table.at_mut(active[self.index]);

        // The deficit is topped up once per visit, not once per call: a flow sending several
        // datagrams in one visit shares a single quantum between them.
        if self.visiting != Some(flow.id) {
            self.visiting = Some(flow.id);

            let state = &mut flow.state;
            if state.deficit < state.quantum {
                state.deficit = state.deficit.saturating_add(state.quantum);
            } else {
                state.deficit = 0;
            }
        }

        let fits = flow.queue.front().is_some_and(|head| head.size() <= flow.state.deficit as usize);
        if fits {
            let datagram = flow.queue.dequeue()?;
            flow.state.deficit -= datagram.size() as u32;
            return Some(datagram);
        }

        self.index = (self.index + 1) % active.len();
        self.visiting = None;
        None
    }

    fn set_weight(&mut self, flow_id: u32, weight: u32) {
        let weight = weight.max(1);
        let quantum = self.quantum(weight);

        if let Some(flow) = self.table.get_mut(flow_id) {
            flow.weight = weight;
            flow.state.quantum = quantum;
        }
    }

    fn backlog(&self) -> usize {
        self.table.backlog()
    }

    fn flows(&self) -> Vec<FlowSnapshot> {
        let mut flows: Vec<_> = self
            .table
            .iter()
            .map(|flow| FlowSnapshot {
                flow_id: flow.id,
                weight: flow.weight,
                queued: flow.queue.occupancy(),
                dropped: flow.queue.dropped(),
                fairness: Fairness::Deficit {
                    deficit: flow.state.deficit,
                    quantum: flow.state.quantum,
                },
            })
            .collect();
        flows.sort_unstable_by_key(|flow| flow.flow_id);
        flows
    }
}

#[cfg(test)]
mod tests {
    use fairq_wire::{Header, MAX_PAYLOAD_SIZE, MINIMAL_HEADER_LEN};

    use crate::DEFAULT_BASE_QUANTUM;

    use super::*;

    /// 100 bytes of payload behind a minimal header: 116 bytes on the wire.
    fn datagram(flow_id: u32, weight: u32) -> Datagram {
        Datagram::new(Header::new(flow_id, weight), [0u8; 100]).unwrap()
    }

    fn calls(drr: &mut DeficitRoundRobin, n: usize) -> Vec<Option<u32>> {
        (0..n).map(|_| drr.dequeue_next().map(|d| d.flow_id())).collect()
    }

    #[test]
    fn visit_drains_up_to_the_deficit() {
        let mut drr = DeficitRoundRobin::new(64, 200);
        for _ in 0..10 {
            let _ = drr.enqueue(datagram(1, 1));
            let _ = drr.enqueue(datagram(2, 2));
        }

        // Quanta are 200 and 400 bytes, datagrams 116 bytes.
        assert_eq!(
            calls(&mut drr, 9),
            [Some(1), None, Some(2), Some(2), Some(2), None, Some(1), Some(1), None]
        );

        // Flow 1 carried 84 bytes into its second visit: 84 + 200 - 2 × 116.
        // Flow 2 is left with 400 - 3 × 116.
        let flows = drr.flows();
        assert_eq!(flows[0].fairness, Fairness::Deficit { deficit: 52, quantum: 200 });
        assert_eq!(flows[1].fairness, Fairness::Deficit { deficit: 52, quantum: 400 });
    }

    #[test]
    fn deficit_at_quantum_is_reset() {
        let mut drr = DeficitRoundRobin::new(64, 512);
        // 1416 bytes on the wire, more than the 512-byte quantum.
        let big = Datagram::new(Header::new(1, 1), vec![0u8; MAX_PAYLOAD_SIZE]).unwrap();
        let _ = drr.enqueue(big);

        // Visit one tops up to 512, visit two finds the deficit at the quantum and resets it.
        assert!(drr.dequeue_next().is_none());
        assert_eq!(drr.flows()[0].fairness, Fairness::Deficit { deficit: 512, quantum: 512 });
        assert!(drr.dequeue_next().is_none());
        assert_eq!(drr.flows()[0].fairness, Fairness::Deficit { deficit: 0, quantum: 512 });
        assert_eq!(drr.backlog(), 1);
    }

    #[test]
    fn default_quantum_serves_full_size_datagrams() {
        let mut drr = DeficitRoundRobin::new(64, DEFAULT_BASE_QUANTUM);
        let big = Datagram::new(Header::new(1, 1), vec![0u8; MAX_PAYLOAD_SIZE]).unwrap();
        assert_eq!(big.size(), MINIMAL_HEADER_LEN + MAX_PAYLOAD_SIZE);
        let _ = drr.enqueue(big.clone());

        assert_eq!(drr.dequeue_next(), Some(big));
    }

    #[test]
    fn weight_change_rescales_the_quantum() {
        let mut drr = DeficitRoundRobin::new(64, 100);
        let _ = drr.enqueue(datagram(3, 1));
        drr.set_weight(3, 4);
        drr.set_weight(99, 4);

        let flows = drr.flows();
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].weight, 4);
        assert_eq!(flows[0].fairness, Fairness::Deficit { deficit: 0, quantum: 400 });
    }

    #[test]
    fn emptied_flow_leaves_the_rotation() {
        let mut drr = DeficitRoundRobin::new(64, 1000);
        let _ = drr.enqueue(datagram(1, 1));
        for _ in 0..3 {
            let _ = drr.enqueue(datagram(2, 1));
        }

        assert_eq!(calls(&mut drr, 5), [Some(1), Some(2), Some(2), Some(2), None]);
        assert_eq!(drr.backlog(), 0);
    }
}
