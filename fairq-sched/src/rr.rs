use fairq_wire::Datagram;

use crate::{table::FlowTable, Admission, Discipline, Fairness, FlowSnapshot};

/// Weighted round robin.
///
/// A cursor cycles over the known flows in first-seen order. Each flow holds send credits,
/// starting at its weight. A visit to a flow with credits left and a non-empty queue sends one
/// datagram and spends one credit. A visit to a flow without credits refills them to the
/// weight and sends nothing, so the refill takes effect on the following visit. The cursor
/// moves one position per visit.
#[derive(Debug)]
pub struct RoundRobin {
    /// Flow state is the remaining send credits.
    table: FlowTable<u32>,
    cursor: usize,
}

impl RoundRobin {
    /// Creates a scheduler with per-flow queues of `flow_capacity` datagrams.
    pub fn new(flow_capacity: usize) -> Self {
        Self { table: FlowTable::new(flow_capacity), cursor: 0 }
    }
}

impl Discipline for RoundRobin {
    fn enqueue(&mut self, datagram: Datagram) -> Admission {
        self.table.enqueue(datagram, |weight| weight).into()
    }

    fn dequeue_next(&mut self) -> Option<Datagram> {
        let len = self.table.len();

        // Two full cycles: the first may only refill credits.
        for _ in 0..2 * len {
            let position = self.cursor % len;
            self.cursor = (position + 1) % len;

            let flow = self.table.at_mut(position);
            if flow.state == 0 {
                flow.state = flow.weight;
                continue;
            }

            if let Some(datagram) = flow.queue.dequeue() {
                flow.state -= 1;
                return Some(datagram);
            }
        }

        None
    }

    fn set_weight(&mut self, flow_id: u32, weight: u32) {
        if let Some(flow) = self.table.get_mut(flow_id) {
            flow.weight = weight.max(1);
            flow.state = flow.state.min(flow.weight);
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
                fairness: Fairness::Credits(flow.state),
            })
            .collect();
        flows.sort_unstable_by_key(|flow| flow.flow_id);
        flows
    }
}
