use std::{
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
};

use tokio::{
    net::{lookup_host, ToSocketAddrs, UdpSocket},
    task::JoinSet,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{driver, state::RouterState, FlowReport, RouterError, RouterOptions, RouterStats};

/// A fair-queueing UDP router.
///
/// Datagrams received on the bound address are queued per flow and forwarded to a single
/// destination in the order chosen by the configured discipline, at no more than the configured
/// bandwidth. Datagrams of one flow are always forwarded in the order they arrived.
///
/// ## Tasks
/// Binding spawns an ingress task, an egress task and optionally a statistics task. They share
/// the scheduler state behind one lock and stop on [`shutdown`](Router::shutdown) or when the
/// router is dropped.
#[derive(Debug)]
pub struct Router {
    /// Where every datagram is forwarded to.
    destination: SocketAddr,
    /// The router state, shared with the driver tasks.
    state: Arc<RouterState>,
    /// The local address of the ingress socket, once bound.
    local_addr: Option<SocketAddr>,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl Router {
    /// Creates a new router forwarding to `destination`, with the default [`RouterOptions`].
    pub fn new(destination: SocketAddr) -> Self {
        Self::with_options(destination, RouterOptions::default())
    }

    /// Creates a new router forwarding to `destination` with the given options.
    pub fn with_options(destination: SocketAddr, options: RouterOptions) -> Self {
        Self {
            destination,
            state: Arc::new(RouterState::new(options)),
            local_addr: None,
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
        }
    }

    /// Binds the ingress socket to the first of the resolved addresses that works, opens the
    /// egress socket and spawns the driver tasks.
    pub async fn bind(&mut self, addr: impl ToSocketAddrs) -> Result<(), RouterError> {
        if let Some(local_addr) = self.local_addr {
            return Err(RouterError::AlreadyBound(local_addr));
        }

        let mut ingress = None;
        for addr in lookup_host(addr).await? {
            match UdpSocket::bind(addr).await {
                Ok(socket) => {
                    ingress = Some(socket);
                    break;
                }
                Err(e) => {
                    warn!(err = ?e, "Failed to bind to {addr}, trying next address");
                }
            }
        }

        let ingress = ingress.ok_or(RouterError::NoValidEndpoints)?;
        let local_addr = ingress.local_addr()?;

        let unspecified: SocketAddr = match self.destination {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let egress = UdpSocket::bind(unspecified).await?;

        let options = &self.state.options;
        info!(
            %local_addr,
            destination = %self.destination,
            algorithm = %options.scheduler.algorithm,
            bandwidth = ?options.bandwidth,
            "Router listening"
        );

        self.tasks.spawn(driver::ingress(Arc::clone(&self.state), ingress, self.cancel.clone()));
        self.tasks.spawn(driver::egress(
            Arc::clone(&self.state),
            egress,
            self.destination,
            self.cancel.clone(),
        ));
        if let Some(interval) = options.stats_interval {
            self.tasks.spawn(driver::report(Arc::clone(&self.state), interval, self.cancel.clone()));
        }

        self.local_addr = Some(local_addr);

        Ok(())
    }

    /// Returns the local address of the ingress socket. `None` if the router is not bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Returns the address datagrams are forwarded to.
    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    /// Returns the router counters.
    pub fn stats(&self) -> &RouterStats {
        &self.state.stats
    }

    /// Returns a report for every flow seen so far, sorted by flow ID.
    pub fn flows(&self) -> Vec<FlowReport> {
        self.state.flows()
    }

    /// Returns the number of datagrams currently queued.
    pub fn backlog(&self) -> usize {
        self.state.backlog()
    }

    /// Stops the driver tasks, waits for them to exit and logs a final summary. Datagrams still
    /// queued are discarded.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();

        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                warn!(err = ?e, "Router task failed");
            }
        }

        debug!(backlog = self.backlog(), "Router tasks stopped");
        self.state.log_summary();
    }
}

impl Drop for Router {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
