use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::Notify;
use tracing::{debug, info};

use fairq_sched::{Admission, Discipline, Scheduler, TokenBucket};
use fairq_wire::Datagram;

use crate::{
    stats::{FlowCounters, FlowReport, RouterStats},
    RouterError, RouterOptions,
};

/// Everything the ingress and egress paths mutate. Cross-flow decisions need a consistent view
/// of all queues, so this sits behind a single lock.
#[derive(Debug)]
struct Core {
    scheduler: Scheduler,
    limiter: Option<TokenBucket>,
    flows: FxHashMap<u32, FlowCounters>,
}

/// A datagram released by the scheduler, along with how long egress must hold it before
/// transmitting.
#[derive(Debug)]
pub(crate) struct Release {
    pub(crate) datagram: Datagram,
    pub(crate) wait: Duration,
}

/// The router state, shared between the driver tasks and the [`Router`](crate::Router).
#[derive(Debug)]
pub(crate) struct RouterState {
    core: Mutex<Core>,
    /// Signalled by ingress whenever a datagram is queued.
    pub(crate) work: Notify,
    pub(crate) stats: RouterStats,
    pub(crate) options: RouterOptions,
}

impl RouterState {
    pub(crate) fn new(options: RouterOptions) -> Self {
        let core = Core {
            scheduler: Scheduler::new(&options.scheduler),
            limiter: options.bandwidth.map(TokenBucket::new),
            flows: FxHashMap::default(),
        };

        Self { core: Mutex::new(core), work: Notify::new(), stats: RouterStats::default(), options }
    }

    /// The ingress step: decodes a frame and queues it on its flow.
    ///
    /// Malformed frames are counted and returned as an error. A full queue is not an error and
    /// is reported as [`Admission::Dropped`].
    pub(crate) fn ingest(&self, frame: Bytes) -> Result<Admission, RouterError> {
        self.stats.increment_rx(frame.len());

        let datagram = match Datagram::decode(frame, self.options.format) {
            Ok(datagram) => datagram,
            Err(e) => {
                self.stats.increment_malformed();
                return Err(e.into());
            }
        };

        let flow_id = datagram.flow_id();
        let weight = datagram.weight();
        let size = datagram.size();

        let admission = {
            let mut guard = self.core.lock();
            let core = &mut *guard;

            let counters = core.flows.entry(flow_id).or_insert_with(|| FlowCounters {
                last_weight: weight,
                ..Default::default()
            });

            if self.options.adopt_weight_changes && counters.last_weight != weight {
                debug!(flow_id, from = counters.last_weight, to = weight, "weight changed");
                core.scheduler.set_weight(flow_id, weight);
            }
            counters.last_weight = weight;
            counters.record_rx(size);

            let admission = core.scheduler.enqueue(datagram);
            if !admission.is_accepted() {
                counters.record_drop(size);
            }

            admission
        };

        if admission.is_accepted() {
            self.work.notify_one();
        } else {
            self.stats.increment_dropped();
            debug!(flow_id, size, "queue full, dropping datagram");
        }

        Ok(admission)
    }

    /// The egress step: asks the scheduler for the next datagram and charges it against the
    /// token bucket. `None` means nothing is eligible right now, which for DRR does not imply
    /// the queues are empty.
    ///
    /// The caller must wait [`Release::wait`] before transmitting, without holding any lock.
    pub(crate) fn next_release(&self) -> Option<Release> {
        let mut core = self.core.lock();
        let datagram = core.scheduler.dequeue_next()?;

        let wait = match core.limiter.as_mut() {
            Some(limiter) => limiter.consume(datagram.size()),
            None => Duration::ZERO,
        };

        Some(Release { datagram, wait })
    }

    /// Records a successful transmission.
    pub(crate) fn record_forwarded(&self, datagram: &Datagram) {
        let size = datagram.size();
        self.stats.increment_tx(size);

        let delay = datagram.received_at().elapsed();
        if let Some(counters) = self.core.lock().flows.get_mut(&datagram.flow_id()) {
            counters.record_tx(size, delay);
        }
    }

    /// Number of datagrams queued across all flows.
    pub(crate) fn backlog(&self) -> usize {
        self.core.lock().scheduler.backlog()
    }

    /// Per-flow reports, sorted by flow ID.
    pub(crate) fn flows(&self) -> Vec<FlowReport> {
        let core = self.core.lock();
        core.scheduler
            .flows()
            .into_iter()
            .map(|snapshot| {
                let counters = core.flows.get(&snapshot.flow_id).cloned().unwrap_or_default();
                FlowReport::new(snapshot, &counters)
            })
            .collect()
    }

    /// Logs the aggregate counters, and every flow at debug level.
    pub(crate) fn log_stats(&self) {
        let stats = &self.stats;
        info!(
            received = stats.received(),
            forwarded = stats.forwarded(),
            dropped = stats.dropped(),
            malformed = stats.malformed(),
            transmit_errors = stats.transmit_errors(),
            backlog = self.backlog(),
            "router stats"
        );

        for flow in self.flows() {
            debug!(
                flow_id = flow.flow_id,
                weight = flow.weight,
                queued = flow.queued,
                received = flow.received,
                forwarded = flow.forwarded,
                dropped = flow.dropped,
                mean_delay = ?flow.mean_queue_delay(),
                "flow stats"
            );
        }
    }

    /// Logs the final summary, with per-flow lines at info level.
    pub(crate) fn log_summary(&self) {
        let stats = &self.stats;
        info!(
            received = stats.received(),
            forwarded = stats.forwarded(),
            bytes_rx = stats.bytes_rx(),
            bytes_tx = stats.bytes_tx(),
            dropped = stats.dropped(),
            malformed = stats.malformed(),
            transmit_errors = stats.transmit_errors(),
            loss = format_args!("{:.2}%", stats.loss_ratio() * 100.0),
            "router stopped"
        );

        for flow in self.flows() {
            info!(
                flow_id = flow.flow_id,
                weight = flow.weight,
                received = flow.received,
                forwarded = flow.forwarded,
                dropped = flow.dropped,
                bytes_tx = flow.bytes_tx,
                mean_delay = ?flow.mean_queue_delay(),
                "flow summary"
            );
        }
    }
}
