use fairq_wire::Datagram;

use crate::{table::FlowTable, Admission, Discipline, Fairness, FlowSnapshot};

/// Weighted fair queueing over a virtual clock.
///
/// Each flow carries a virtual finish time, starting at zero. The next datagram comes from the
/// non-empty flow with the smallest finish time, ties going to the lowest flow ID. Serving a
/// flow advances the system virtual time to at least that flow's finish time, then pushes the
/// flow's finish time to `virtual_time + size / weight`. Heavier flows age more slowly per byte
/// and get picked proportionally more often.
#[derive(Debug)]
pub struct WeightedFair {
    /// Flow state is the virtual finish time.
    table: FlowTable<f64>,
    virtual_time: f64,
}

impl WeightedFair {
    /// Creates a scheduler with per-flow queues of `flow_capacity` datagrams.
    pub fn new(flow_capacity: usize) -> Self {
        Self { table: FlowTable::new(flow_capacity), virtual_time: 0.0 }
    }

    /// Returns the system virtual time. It never decreases.
    #[inline]
    pub const fn virtual_time(&self) -> f64 {
        self.virtual_time
    }
}

impl Discipline for WeightedFair {
    fn enqueue(&mut self, datagram: Datagram) -> Admission {
        self.table.enqueue(datagram, |_| 0.0).into()
    }

    fn dequeue_next(&mut self) -> Option<Datagram> {
        let position = self
            .table
            .active_positions()
            .into_iter()
            .min_by(|&a, &b| {
                let (a, b) = (self.table.at(a), self.table.at(b));
                a.state.total_cmp(&b.state).then(a.id.cmp(&b.id))
            })?;

        let flow = self.table.at_mut(position);
        self.virtual_time = self.virtual_time.max(flow.state);

        let datagram = flow.queue.dequeue()?;
        flow.state = self.virtual_time + datagram.size() as f64 / flow.weight as f64;

        Some(datagram)
    }

    fn set_weight(&mut self, flow_id: u32, weight: u32) {
        if let Some(flow) = self.table.get_mut(flow_id) {
            flow.weight = weight.max(1);
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
                fairness: Fairness::VirtualFinish(flow.state),
            })
            .collect();
        flows.sort_unstable_by_key(|flow| flow.flow_id);
        flows
    }
}
