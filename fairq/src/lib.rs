//! Fair-queueing UDP router.
//!
//! Re-exports the router from `fairq-router`, the scheduling disciplines from `fairq-sched` and
//! the wire codec as [`wire`].
#![doc(issue_tracker_base_url = "https://github.com/fairq/fairq/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use fairq_router::*;
pub use fairq_sched::{
    limiter, Admission, Algorithm, DeficitRoundRobin, Discipline, Fairness, Fifo, FlowQueue,
    FlowSnapshot, RoundRobin, Scheduler, SchedulerConfig, TokenBucket, WeightedFair,
};
pub use fairq_wire as wire;
