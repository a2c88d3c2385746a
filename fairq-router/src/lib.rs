//! The fairq router pipeline.
//!
//! A [`Router`] receives datagrams on a UDP socket, classifies them by flow and hands them to a
//! [`Scheduler`](fairq_sched::Scheduler). An independent egress task pulls datagrams back out in
//! the order the scheduling discipline chooses, charges them against an optional
//! [`TokenBucket`](fairq_sched::TokenBucket) and forwards them to a single destination.
//!
//! ```no_run
//! use fairq_router::{Router, RouterOptions};
//! use fairq_sched::{Algorithm, SchedulerConfig};
//!
//! # async fn run() -> Result<(), fairq_router::RouterError> {
//! let options = RouterOptions::default()
//!     .scheduler(SchedulerConfig::new(Algorithm::WeightedFair))
//!     .bandwidth(1_000 * 1024);
//!
//! let mut router = Router::with_options("127.0.0.1:9001".parse().unwrap(), options);
//! router.bind("0.0.0.0:9000").await?;
//!
//! tokio::signal::ctrl_c().await?;
//! router.shutdown().await;
//! # Ok(())
//! # }
//! ```
#![doc(issue_tracker_base_url = "https://github.com/fairq/fairq/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use std::{io, time::Duration};

use thiserror::Error;

use fairq_sched::SchedulerConfig;
use fairq_wire::Format;

mod driver;

mod router;
pub use router::Router;

mod state;

mod stats;
pub use stats::{FlowReport, RouterStats};

/// Default upper bound on how long egress sleeps when nothing is eligible.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1);

/// Default interval between periodic statistics reports.
const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Errors returned by the router.
#[derive(Debug, Error)]
pub enum RouterError {
    /// A socket operation failed.
    #[error("IO error: {0:?}")]
    Io(#[from] io::Error),
    /// A received frame could not be decoded.
    #[error("Wire protocol error: {0}")]
    Wire(#[from] fairq_wire::Error),
    /// [`Router::bind`] was called on a bound router.
    #[error("Router is already bound to {0}")]
    AlreadyBound(std::net::SocketAddr),
    /// None of the resolved addresses could be bound.
    #[error("Could not bind to any valid endpoints")]
    NoValidEndpoints,
}

/// Router configuration, built with the setters below from [`RouterOptions::default`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// The scheduling discipline and its queue sizes.
    pub(crate) scheduler: SchedulerConfig,
    /// Egress bandwidth cap in bytes per second. `None` forwards as fast as possible.
    pub(crate) bandwidth: Option<u64>,
    /// The header layout expected on ingress.
    pub(crate) format: Format,
    /// How long egress waits for new work before polling the scheduler again. DRR may return
    /// nothing while datagrams are queued, so this only bounds the wait when the router is idle.
    pub(crate) idle_timeout: Duration,
    /// Interval of the periodic statistics report. `None` disables it.
    pub(crate) stats_interval: Option<Duration>,
    /// Whether a known flow's weight follows the weight carried by its latest datagram. When
    /// off, a flow keeps the weight of its first datagram.
    pub(crate) adopt_weight_changes: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            bandwidth: None,
            format: Format::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            stats_interval: Some(DEFAULT_STATS_INTERVAL),
            adopt_weight_changes: false,
        }
    }
}

impl RouterOptions {
    /// Sets the scheduler configuration.
    pub fn scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Caps egress at `bandwidth` bytes per second. Zero removes the cap.
    pub fn bandwidth(mut self, bandwidth: u64) -> Self {
        self.bandwidth = (bandwidth > 0).then_some(bandwidth);
        self
    }

    /// Sets the header layout expected on ingress.
    pub fn format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Sets how long egress waits for new work when the scheduler has nothing eligible.
    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Sets the interval of the periodic statistics report.
    pub fn stats_interval(mut self, stats_interval: Duration) -> Self {
        self.stats_interval = Some(stats_interval);
        self
    }

    /// Disables the periodic statistics report. The summary on shutdown is still logged.
    pub fn without_stats_report(mut self) -> Self {
        self.stats_interval = None;
        self
    }

    /// Lets known flows pick up weight changes carried by later datagrams.
    pub fn adopt_weight_changes(mut self, adopt: bool) -> Self {
        self.adopt_weight_changes = adopt;
        self
    }
}
