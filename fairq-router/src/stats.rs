use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use fairq_sched::{Fairness, FlowSnapshot};

/// Aggregate router counters. These are shared between the driver tasks and the [`Router`]
/// handle and can be read at any time.
///
/// [`Router`]: crate::Router
#[derive(Debug, Default)]
pub struct RouterStats {
    /// Datagrams read off the ingress socket, malformed ones included.
    received: AtomicU64,
    /// Bytes read off the ingress socket.
    bytes_rx: AtomicU64,
    /// Datagrams transmitted to the destination.
    forwarded: AtomicU64,
    /// Bytes transmitted to the destination.
    bytes_tx: AtomicU64,
    /// Datagrams rejected because their queue was full.
    dropped: AtomicU64,
    /// Datagrams discarded because the header could not be decoded.
    malformed: AtomicU64,
    /// Failed transmissions. The datagram is lost.
    transmit_errors: AtomicU64,
}

impl RouterStats {
    #[inline]
    pub(crate) fn increment_rx(&self, bytes: usize) {
        self.received.fetch_add(1, Ordering::Relaxed);
        self.bytes_rx.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_tx(&self, bytes: usize) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.bytes_tx.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_transmit_errors(&self) {
        self.transmit_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of datagrams received, malformed ones included.
    #[inline]
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes received.
    #[inline]
    pub fn bytes_rx(&self) -> u64 {
        self.bytes_rx.load(Ordering::Relaxed)
    }

    /// Returns the number of datagrams forwarded.
    #[inline]
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes forwarded.
    #[inline]
    pub fn bytes_tx(&self) -> u64 {
        self.bytes_tx.load(Ordering::Relaxed)
    }

    /// Returns the number of datagrams dropped on a full queue.
    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of datagrams that failed to decode.
    #[inline]
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Returns the number of failed sends.
    #[inline]
    pub fn transmit_errors(&self) -> u64 {
        self.transmit_errors.load(Ordering::Relaxed)
    }

    /// Returns the share of received datagrams that were dropped or malformed, in `[0, 1]`.
    pub fn loss_ratio(&self) -> f64 {
        let received = self.received();
        if received == 0 {
            return 0.0;
        }

        (self.dropped() + self.malformed()) as f64 / received as f64
    }
}

/// Per-flow counters, kept next to the scheduler under the pipeline lock.
#[derive(Debug, Default, Clone)]
pub(crate) struct FlowCounters {
    /// The weight carried by the flow's most recent datagram.
    pub(crate) last_weight: u32,
    pub(crate) received: u64,
    pub(crate) bytes_rx: u64,
    pub(crate) forwarded: u64,
    pub(crate) bytes_tx: u64,
    pub(crate) dropped: u64,
    pub(crate) bytes_dropped: u64,
    /// Sum of the time forwarded datagrams spent between ingress and transmission.
    pub(crate) queue_delay: Duration,
}

impl FlowCounters {
    #[inline]
    pub(crate) fn record_rx(&mut self, bytes: usize) {
        self.received += 1;
        self.bytes_rx += bytes as u64;
    }

    #[inline]
    pub(crate) fn record_tx(&mut self, bytes: usize, delay: Duration) {
        self.forwarded += 1;
        self.bytes_tx += bytes as u64;
        self.queue_delay += delay;
    }

    #[inline]
    pub(crate) fn record_drop(&mut self, bytes: usize) {
        self.dropped += 1;
        self.bytes_dropped += bytes as u64;
    }
}

/// A snapshot of one flow: scheduler state and traffic counters.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowReport {
    /// The flow ID.
    pub flow_id: u32,
    /// The weight the flow is scheduled with.
    pub weight: u32,
    /// Datagrams currently queued.
    pub queued: usize,
    /// The discipline's fairness state for this flow.
    pub fairness: Fairness,
    /// Datagrams received on this flow.
    pub received: u64,
    /// Bytes received on this flow.
    pub bytes_rx: u64,
    /// Datagrams forwarded.
    pub forwarded: u64,
    /// Bytes forwarded.
    pub bytes_tx: u64,
    /// Datagrams dropped on a full queue.
    pub dropped: u64,
    /// Bytes dropped on a full queue.
    pub bytes_dropped: u64,
    /// Cumulative queueing delay of forwarded datagrams.
    pub queue_delay: Duration,
}

impl FlowReport {
    pub(crate) fn new(snapshot: FlowSnapshot, counters: &FlowCounters) -> Self {
        Self {
            flow_id: snapshot.flow_id,
            weight: snapshot.weight,
            queued: snapshot.queued,
            fairness: snapshot.fairness,
            received: counters.received,
            bytes_rx: counters.bytes_rx,
            forwarded: counters.forwarded,
            bytes_tx: counters.bytes_tx,
            dropped: counters.dropped,
            bytes_dropped: counters.bytes_dropped,
            queue_delay: counters.queue_delay,
        }
    }

    /// Mean queueing delay of the flow's forwarded datagrams.
    pub fn mean_queue_delay(&self) -> Duration {
        match u32::try_from(self.forwarded) {
            Ok(0) => Duration::ZERO,
            Ok(forwarded) => self.queue_delay / forwarded,
            Err(_) => Duration::from_secs_f64(self.queue_delay.as_secs_f64() / self.forwarded as f64),
        }
    }
}
