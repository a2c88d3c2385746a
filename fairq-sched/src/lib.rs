//! The fairq scheduling engine.
//!
//! Datagrams are buffered per flow in bounded [`FlowQueue`]s and released one at a time by a
//! [`Discipline`]. The [`Scheduler`] enum picks one of four disciplines at construction:
//!
//! - [`Fifo`]: one shared queue, arrival order.
//! - [`RoundRobin`]: weighted round robin with per-flow send credits.
//! - [`DeficitRoundRobin`]: byte-based round robin with a per-flow quantum.
//! - [`WeightedFair`]: weighted fair queueing over a virtual clock.
//!
//! Whatever the discipline, datagrams of one flow always leave in the order they arrived.
//!
//! Egress is shaped by a [`TokenBucket`], shared by all flows.
#![doc(issue_tracker_base_url = "https://github.com/fairq/fairq/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use std::{fmt, str::FromStr};

use fairq_wire::{Datagram, MAX_DATAGRAM_SIZE};

mod drr;
pub use drr::DeficitRoundRobin;

mod fifo;
pub use fifo::Fifo;

pub mod limiter;
pub use limiter::TokenBucket;

mod queue;
pub use queue::FlowQueue;

mod rr;
pub use rr::RoundRobin;

mod table;

mod wfq;
pub use wfq::WeightedFair;

/// Default queue capacity of a flow, in datagrams.
pub const DEFAULT_FLOW_CAPACITY: usize = 1_000;

/// Default capacity of the single shared FIFO queue, in datagrams.
pub const DEFAULT_FIFO_CAPACITY: usize = 10_000;

/// Default DRR base quantum in bytes. A flow's quantum is this times its weight.
///
/// Must be at least [`MAX_DATAGRAM_SIZE`], otherwise a weight-1 flow sending full-size
/// datagrams never accumulates enough deficit to be served.
pub const DEFAULT_BASE_QUANTUM: u32 = 1_500;

const _: () = assert!(DEFAULT_BASE_QUANTUM as usize >= MAX_DATAGRAM_SIZE);

/// The outcome of [`Discipline::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Admission {
    /// The datagram was queued.
    Accepted,
    /// The queue was full and the datagram was dropped.
    Dropped,
}

impl Admission {
    /// Returns `true` if the datagram was queued.
    #[inline]
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl From<bool> for Admission {
    fn from(accepted: bool) -> Self {
        if accepted {
            Self::Accepted
        } else {
            Self::Dropped
        }
    }
}

/// The common contract of all scheduling disciplines.
///
/// Neither operation fails: a full queue is reported as [`Admission::Dropped`], and having
/// nothing to send is `None`.
pub trait Discipline: fmt::Debug + Send {
    /// Routes the datagram into the queue of its flow, creating the flow if it is new.
    fn enqueue(&mut self, datagram: Datagram) -> Admission;

    /// Selects and removes the next datagram to transmit.
    ///
    /// `None` means nothing is eligible right now. For most disciplines this implies all queues
    /// are empty, but [`DeficitRoundRobin`] also returns `None` when it moves on to the next
    /// flow; check [`backlog`](Self::backlog) before going idle.
    fn dequeue_next(&mut self) -> Option<Datagram>;

    /// Changes the weight of a known flow. Unknown flows are ignored.
    fn set_weight(&mut self, flow_id: u32, weight: u32);

    /// Returns the total number of queued datagrams.
    fn backlog(&self) -> usize;

    /// Returns a snapshot of every known flow, sorted by flow ID.
    fn flows(&self) -> Vec<FlowSnapshot>;
}

/// Per-flow scheduling state, for observability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fairness {
    /// The discipline keeps no per-flow state.
    None,
    /// Round robin send credits left in the current cycle.
    Credits(u32),
    /// DRR deficit and quantum, in bytes.
    Deficit { deficit: u32, quantum: u32 },
    /// WFQ virtual finish time.
    VirtualFinish(f64),
}

/// A point-in-time view of one flow.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSnapshot {
    /// The flow ID.
    pub flow_id: u32,
    /// The weight the flow is scheduled with.
    pub weight: u32,
    /// Datagrams currently queued.
    pub queued: usize,
    /// Datagrams dropped on admission so far.
    pub dropped: u64,
    /// The discipline's fairness state for this flow.
    pub fairness: Fairness,
}

/// The available disciplines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// First in, first out across all flows.
    #[default]
    Fifo,
    /// Weighted round robin, one datagram per credit.
    RoundRobin,
    /// Deficit round robin, a byte quantum per visit.
    DeficitRoundRobin,
    /// Weighted fair queueing by virtual finish time.
    WeightedFair,
}

impl Algorithm {
    /// The short name used on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::RoundRobin => "rr",
            Self::DeficitRoundRobin => "drr",
            Self::WeightedFair => "wfq",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown algorithm name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAlgorithm(pub String);

impl fmt::Display for UnknownAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown algorithm {:?}, expected one of fifo, rr, drr, wfq", self.0)
    }
}

impl std::error::Error for UnknownAlgorithm {}

impl FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "rr" | "round-robin" => Ok(Self::RoundRobin),
            "drr" | "deficit-round-robin" => Ok(Self::DeficitRoundRobin),
            "wfq" | "weighted-fair" => Ok(Self::WeightedFair),
            _ => Err(UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// The discipline to run.
    pub algorithm: Algorithm,
    /// Queue capacity of each flow, in datagrams.
    pub flow_capacity: usize,
    /// Capacity of the shared queue used by [`Algorithm::Fifo`].
    pub fifo_capacity: usize,
    /// DRR base quantum in bytes.
    pub base_quantum: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            flow_capacity: DEFAULT_FLOW_CAPACITY,
            fifo_capacity: DEFAULT_FIFO_CAPACITY,
            base_quantum: DEFAULT_BASE_QUANTUM,
        }
    }
}

impl SchedulerConfig {
    /// Creates a default configuration for the given algorithm.
    pub fn new(algorithm: Algorithm) -> Self {
        Self { algorithm, ..Default::default() }
    }

    /// Sets the per-flow queue capacity.
    pub fn flow_capacity(mut self, flow_capacity: usize) -> Self {
        self.flow_capacity = flow_capacity;
        self
    }

    /// Sets the capacity of the shared FIFO queue.
    pub fn fifo_capacity(mut self, fifo_capacity: usize) -> Self {
        self.fifo_capacity = fifo_capacity;
        self
    }

    /// Sets the DRR base quantum. Values below [`MAX_DATAGRAM_SIZE`] can starve flows that send
    /// large datagrams.
    pub fn base_quantum(mut self, base_quantum: u32) -> Self {
        self.base_quantum = base_quantum;
        self
    }
}

/// A scheduler running one of the four disciplines, chosen once at construction.
#[derive(Debug)]
pub enum Scheduler {
    /// See [`Fifo`].
    Fifo(Fifo),
    /// See [`RoundRobin`].
    RoundRobin(RoundRobin),
    /// See [`DeficitRoundRobin`].
    DeficitRoundRobin(DeficitRoundRobin),
    /// See [`WeightedFair`].
    WeightedFair(WeightedFair),
}

impl Scheduler {
    /// Creates the scheduler selected by `config`.
    pub fn new(config: &SchedulerConfig) -> Self {
        match config.algorithm {
            Algorithm::Fifo => Self::Fifo(Fifo::new(config.fifo_capacity)),
            Algorithm::RoundRobin => Self::RoundRobin(RoundRobin::new(config.flow_capacity)),
            Algorithm::DeficitRoundRobin => Self::DeficitRoundRobin(DeficitRoundRobin::new(
                config.flow_capacity,
                config.base_quantum,
            )),
            Algorithm::WeightedFair => Self::WeightedFair(WeightedFair::new(config.flow_capacity)),
        }
    }

    /// Returns the discipline this scheduler runs.
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::Fifo(_) => Algorithm::Fifo,
            Self::RoundRobin(_) => Algorithm::RoundRobin,
            Self::DeficitRoundRobin(_) => Algorithm::DeficitRoundRobin,
            Self::WeightedFair(_) => Algorithm::WeightedFair,
        }
    }

    #[inline]
    fn inner(&self) -> &dyn Discipline {
        match self {
            Self::Fifo(d) => d,
            Self::RoundRobin(d) => d,
            Self::DeficitRoundRobin(d) => d,
            Self::WeightedFair(d) => d,
        }
    }

    #[inline]
    fn inner_mut(&mut self) -> &mut dyn Discipline {
        match self {
            Self::Fifo(d) => d,
            Self::RoundRobin(d) => d,
            Self::DeficitRoundRobin(d) => d,
            Self::WeightedFair(d) => d,
        }
    }
}

impl Discipline for Scheduler {
    fn enqueue(&mut self, datagram: Datagram) -> Admission {
        self.inner_mut().enqueue(datagram)
    }

    fn dequeue_next(&mut self) -> Option<Datagram> {
        self.inner_mut().dequeue_next()
    }

    fn set_weight(&mut self, flow_id: u32, weight: u32) {
        self.inner_mut().set_weight(flow_id, weight)
    }

    fn backlog(&self) -> usize {
        self.inner().backlog()
    }

    fn flows(&self) -> Vec<FlowSnapshot> {
        self.inner().flows()
    }
}
