//! Periodic signaling loops
//!
//! Two loops run for the lifetime of a call: a keepalive ping and a
//! signaling pull. Each checks the leaving token before every iteration
//! and each owns its own failure: a request that is still failing after
//! its retry budget stops that loop, and only that loop.

use crate::call::controller::SessionEvent;
use crate::transport::{retrying, SignalingBackend};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Spawn the keepalive ping loop
pub(crate) fn spawn_ping_loop(
    backend: Arc<dyn SignalingBackend>,
    room_token: String,
    interval: Duration,
    retries: u32,
    leaving: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if leaving.is_cancelled() {
                debug!("ping loop stopping, call is leaving");
                break;
            }

            if let Err(e) = retrying(retries, || backend.ping_call(&room_token)).await {
                warn!("keepalive ping failed after retries, stopping pings: {e}");
                break;
            }

            tokio::select! {
                _ = leaving.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}

/// Spawn the signaling pull loop
///
/// Pulled items are forwarded raw to the event task in server order;
/// decoding happens there so this loop never touches session state.
pub(crate) fn spawn_pull_loop(
    backend: Arc<dyn SignalingBackend>,
    room_token: String,
    interval: Duration,
    retries: u32,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    leaving: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if leaving.is_cancelled() {
                debug!("pull loop stopping, call is leaving");
                break;
            }

            match retrying(retries, || backend.pull_messages(&room_token)).await {
                Ok(items) => {
                    for item in items {
                        if event_tx.send(SessionEvent::Inbound(item)).is_err() {
                            // Event task is gone; nothing left to feed.
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!("signaling pull failed after retries, stopping pulls: {e}");
                    break;
                }
            }

            tokio::select! {
                _ = leaving.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    })
}
