use std::collections::VecDeque;

use fairq_wire::Datagram;

/// A bounded FIFO buffer of pending datagrams for one flow.
///
/// The bound is on the number of queued datagrams, not on their size. A full queue drops new
/// arrivals and counts them; this is expected under overload and is not an error.
#[derive(Debug)]
pub struct FlowQueue {
    items: VecDeque<Datagram>,
    capacity: usize,
    /// Datagrams refused because the queue was full.
    dropped: u64,
}

impl FlowQueue {
    /// Creates an empty queue holding at most `capacity` datagrams.
    pub fn new(capacity: usize) -> Self {
        Self { items: VecDeque::new(), capacity, dropped: 0 }
    }

    /// Appends the datagram if there is room. Returns `false` and counts a drop otherwise.
    pub fn enqueue(&mut self, datagram: Datagram) -> bool {
        if self.items.len() >= self.capacity {
            self.dropped += 1;
            return false;
        }

        self.items.push_back(datagram);
        true
    }

    /// Removes and returns the oldest datagram.
    #[inline]
    pub fn dequeue(&mut self) -> Option<Datagram> {
        self.items.pop_front()
    }

    /// Returns the oldest datagram without removing it.
    #[inline]
    pub fn front(&self) -> Option<&Datagram> {
        self.items.front()
    }

    /// Returns `true` if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of queued datagrams.
    #[inline]
    pub fn occupancy(&self) -> usize {
        self.items.len()
    }

    /// Returns the maximum number of queued datagrams.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of datagrams dropped so far.
    #[inline]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}
