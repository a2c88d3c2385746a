use std::collections::BTreeMap;

use fairq_wire::Datagram;

use crate::{queue::FlowQueue, Admission, Discipline, Fairness, FlowSnapshot};

/// Per-flow bookkeeping for snapshots. Not used for ordering.
#[derive(Debug, Default)]
struct FlowEntry {
    weight: u32,
    queued: usize,
    dropped: u64,
}

/// First-in-first-out: a single shared queue, served in arrival order regardless of flow or
/// weight.
#[derive(Debug)]
pub struct Fifo {
    queue: FlowQueue,
    flows: BTreeMap<u32, FlowEntry>,
}

impl Fifo {
    /// Creates a FIFO scheduler whose shared queue holds at most `capacity` datagrams.
    pub fn new(capacity: usize) -> Self {
        Self { queue: FlowQueue::new(capacity), flows: BTreeMap::new() }
    }
}

impl Discipline for Fifo {
    fn enqueue(&mut self, datagram: Datagram) -> Admission {
        let entry = self
            .flows
            .entry(datagram.flow_id())
            .or_insert_with(|| FlowEntry { weight: datagram.weight(), ..Default::default() });

        if self.queue.enqueue(datagram) {
            entry.queued += 1;
            Admission::Accepted
        } else {
            entry.dropped += 1;
            Admission::Dropped
        }
    }

    fn dequeue_next(&mut self) -> Option<Datagram> {
        let datagram = self.queue.dequeue()?;
        if let Some(entry) = self.flows.get_mut(&datagram.flow_id()) {
            entry.queued -= 1;
        }

        Some(datagram)
    }

    fn set_weight(&mut self, flow_id: u32, weight: u32) {
        if let Some(entry) = self.flows.get_mut(&flow_id) {
            entry.weight = weight.max(1);
        }
    }

    fn backlog(&self) -> usize {
        self.queue.occupancy()
    }

    fn flows(&self) -> Vec<FlowSnapshot> {
        self.flows
            .iter()
            .map(|(&flow_id, entry)| FlowSnapshot {
                flow_id,
                weight: entry.weight,
                queued: entry.queued,
                dropped: entry.dropped,
                fairness: Fairness::None,
            })
            .collect()
    }
}
