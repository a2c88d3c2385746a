use fairq_wire::Datagram;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::queue::FlowQueue;

/// A flow known to a discipline: its queue, its weight and the discipline-specific state `S`.
#[derive(Debug)]
pub(crate) struct Flow<S> {
    pub(crate) id: u32,
    pub(crate) weight: u32,
    pub(crate) queue: FlowQueue,
    pub(crate) state: S,
}

/// The flow table. Flows are kept in the order they were first seen and are never removed, so
/// positions are stable for the lifetime of the table.
#[derive(Debug)]
pub(crate) struct FlowTable<S> {
    /// Flow ID -> position in `flows`.
    index: FxHashMap<u32, usize>,
    flows: Vec<Flow<S>>,
    /// Queue capacity for new flows.
    capacity: usize,
}

impl<S> FlowTable<S> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self { index: FxHashMap::default(), flows: Vec::new(), capacity }
    }

    /// Routes the datagram into its flow queue, creating the flow with the datagram's weight if
    /// it is new. Returns whether the queue accepted it.
    pub(crate) fn enqueue(
        &mut self,
        datagram: Datagram,
        init: impl FnOnce(u32) -> S,
    ) -> bool {
        let flow_id = datagram.flow_id();
        let position = match self.index.get(&flow_id) {
            Some(&position) => position,
            None => {
                let weight = datagram.weight();
                debug!(flow_id, weight, capacity = self.capacity, "new flow");

                self.flows.push(Flow {
                    id: flow_id,
                    weight,
                    queue: FlowQueue::new(self.capacity),
                    state: init(weight),
                });
                self.index.insert(flow_id, self.flows.len() - 1);
                self.flows.len() - 1
            }
        };

        self.flows[position].queue.enqueue(datagram)
    }

    pub(crate) fn get_mut(&mut self, flow_id: u32) -> Option<&mut Flow<S>> {
        let position = *self.index.get(&flow_id)?;
        Some(&mut self.flows[position])
    }

    #[inline]
    pub(crate) fn at(&self, position: usize) -> &Flow<S> {
        &self.flows[position]
    }

    #[inline]
    pub(crate) fn at_mut(&mut self, position: usize) -> &mut Flow<S> {
        &mut self.flows[position]
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.flows.len()
    }

    /// Positions of flows with queued datagrams, in first-seen order.
    pub(crate) fn active_positions(&self) -> Vec<usize> {
        self.flows
            .iter()
            .enumerate()
            .filter(|(_, flow)| !flow.queue.is_empty())
            .map(|(position, _)| position)
            .collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Flow<S>> {
        self.flows.iter()
    }

    /// Total number of queued datagrams across all flows.
    pub(crate) fn backlog(&self) -> usize {
        self.flows.iter().map(|flow| flow.queue.occupancy()).sum()
    }
}
