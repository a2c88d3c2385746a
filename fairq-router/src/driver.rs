use std::{net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use fairq_wire::MAX_DATAGRAM_SIZE;

use crate::state::{Release, RouterState};

/// Receive buffer size. Anything past the largest valid datagram is cut off by the decoder, so
/// this only needs to be large enough to measure oversized frames.
const RECV_BUFFER_SIZE: usize = 65_536;

const _: () = assert!(RECV_BUFFER_SIZE > MAX_DATAGRAM_SIZE);

/// The ingress loop: reads datagrams off the socket and queues them until cancelled.
pub(crate) async fn ingress(state: Arc<RouterState>, socket: UdpSocket, cancel: CancellationToken) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];

    loop {
        let (len, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok(received) => received,
                Err(e) => {
                    warn!(err = ?e, "Failed to receive datagram");
                    continue;
                }
            },
        };

        trace!(%peer, len, "received datagram");
        if let Err(e) = state.ingest(Bytes::copy_from_slice(&buf[..len])) {
            debug!(%peer, len, "Discarding datagram: {e}");
        }
    }

    debug!("Ingress stopped");
}

/// The egress loop: pulls datagrams from the scheduler, paces them through the token bucket and
/// forwards them to `destination` until cancelled.
pub(crate) async fn egress(
    state: Arc<RouterState>,
    socket: UdpSocket,
    destination: SocketAddr,
    cancel: CancellationToken,
) {
    let idle_timeout = state.options.idle_timeout;

    while !cancel.is_cancelled() {
        let Some(Release { datagram, wait }) = state.next_release() else {
            if state.backlog() > 0 {
                // DRR ended a visit without sending. Try the next flow right away.
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = state.work.notified() => {}
                _ = tokio::time::sleep(idle_timeout) => {}
            }
            continue;
        };

        if !wait.is_zero() {
            trace!(flow_id = datagram.flow_id(), ?wait, "shaping");
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        match socket.send_to(datagram.frame(), destination).await {
            Ok(_) => state.record_forwarded(&datagram),
            Err(e) => {
                state.stats.increment_transmit_errors();
                error!(err = ?e, flow_id = datagram.flow_id(), %destination, "Failed to forward datagram");
            }
        }
    }

    debug!("Egress stopped");
}

/// Logs the router counters every `interval` until cancelled.
pub(crate) async fn report(state: Arc<RouterState>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => state.log_stats(),
        }
    }
}
