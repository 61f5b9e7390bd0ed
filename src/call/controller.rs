//! Call lifecycle control
//!
//! [`CallController::join`] drives the join sequence (room first, then
//! call) and hands back an [`ActiveCall`]. The active call runs a single
//! event task that owns the peer registry; roster snapshots, negotiation
//! messages and locally produced media events all funnel through one
//! channel into that task, so session state has exactly one writer and
//! needs no locking. [`ActiveCall::hangup`] cancels the leaving token,
//! waits for the event task to tear sessions down, then leaves the call
//! and the room in that order.

use crate::call::loops::{spawn_ping_loop, spawn_pull_loop};
use crate::config::CallConfig;
use crate::media::{MediaConnection, MediaEngine, MediaEvent, RenderUpdate};
use crate::peer::registry::PeerRegistry;
use crate::roster;
use crate::signaling::protocol::{self, SignalingEvent};
use crate::signaling::router;
use crate::transport::{retrying, SignalingBackend};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle phase of a call session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    /// Not yet joined anywhere
    Idle,
    /// Room membership established, call not yet joined
    RoomJoined,
    /// In the call; loops are running
    CallJoined,
    /// Hangup in progress
    Leaving,
    /// Fully torn down
    Terminated,
}

/// One unit of work for the event task
///
/// Everything that mutates session state arrives as one of these, from
/// the pull loop, from push responses or from the embedding application's
/// media engine.
#[derive(Debug)]
pub enum SessionEvent {
    /// Raw signaling item to decode and apply
    Inbound(Value),
    /// Locally produced negotiation event to push to the server
    Media(MediaEvent),
}

/// Entry point for joining a call
pub struct CallController {
    config: CallConfig,
    backend: Arc<dyn SignalingBackend>,
    engine: Arc<dyn MediaEngine>,
    render_tx: mpsc::UnboundedSender<RenderUpdate>,
}

impl CallController {
    /// Create a controller and the render update stream it will feed
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] when the configuration fails
    /// validation.
    pub fn new(
        config: CallConfig,
        backend: Arc<dyn SignalingBackend>,
        engine: Arc<dyn MediaEngine>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RenderUpdate>)> {
        config.validate()?;
        let (render_tx, render_rx) = mpsc::unbounded_channel();
        Ok((
            Self {
                config,
                backend,
                engine,
                render_tx,
            },
            render_rx,
        ))
    }

    /// Join the room, then the call, and start the signaling loops
    ///
    /// The two joins are sequential; a call join failure leaves the room
    /// again on a best-effort basis before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Lifecycle`] when either join fails.
    pub async fn join(self, room_token: &str) -> Result<ActiveCall> {
        self.backend
            .join_room(room_token)
            .await
            .map_err(|e| Error::Lifecycle(format!("join-room failed: {e}")))?;

        let local_session_id = match self.backend.join_call(room_token).await {
            Ok(session_id) => session_id,
            Err(e) => {
                if let Err(leave_err) = self.backend.leave_room(room_token).await {
                    warn!("leave-room after failed call join also failed: {leave_err}");
                }
                return Err(Error::Lifecycle(format!("join-call failed: {e}")));
            }
        };
        info!(room_token, %local_session_id, "joined call");

        let local_connection = self.engine.create_connection(&local_session_id).await?;

        let leaving = CancellationToken::new();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let state = SessionState {
            config: self.config.clone(),
            backend: self.backend.clone(),
            engine: self.engine.clone(),
            room_token: room_token.to_string(),
            local_session_id: local_session_id.clone(),
            registry: PeerRegistry::new(self.engine.clone(), local_session_id.clone()),
            local_connection: Some(local_connection),
            render_tx: self.render_tx.clone(),
            event_tx: event_tx.clone(),
            leaving: leaving.clone(),
        };
        let event_task = tokio::spawn(state.run(event_rx));

        let ping_task = spawn_ping_loop(
            self.backend.clone(),
            room_token.to_string(),
            self.config.ping_interval(),
            self.config.request_retries,
            leaving.clone(),
        );
        let pull_task = spawn_pull_loop(
            self.backend.clone(),
            room_token.to_string(),
            self.config.pull_interval(),
            self.config.request_retries,
            event_tx.clone(),
            leaving.clone(),
        );

        Ok(ActiveCall {
            phase: CallPhase::CallJoined,
            room_token: room_token.to_string(),
            local_session_id,
            backend: self.backend,
            event_tx,
            leaving,
            event_task,
            ping_task,
            pull_task,
        })
    }
}

/// A joined call; dropping it cancels the loops
pub struct ActiveCall {
    phase: CallPhase,
    room_token: String,
    local_session_id: String,
    backend: Arc<dyn SignalingBackend>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    leaving: CancellationToken,
    event_task: JoinHandle<()>,
    ping_task: JoinHandle<()>,
    pull_task: JoinHandle<()>,
}

impl ActiveCall {
    /// Server-assigned identifier of this participant's session
    pub fn local_session_id(&self) -> &str {
        &self.local_session_id
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> CallPhase {
        self.phase
    }

    /// Sender the embedding application uses to report media events
    ///
    /// The media engine's locally produced descriptions and candidates go
    /// in here as [`SessionEvent::Media`] and come out on the wire.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.event_tx.clone()
    }

    /// Hang up: tear down sessions, then leave the call, then the room
    ///
    /// Cancellation is signalled first so the loops and the event task
    /// stop feeding new work; the event task destroys every peer session
    /// before this returns. The room is left even when leaving the call
    /// fails, and failures of either are logged, not propagated; a
    /// participant hanging up must always end up out of the call.
    pub async fn hangup(mut self) {
        self.phase = CallPhase::Leaving;
        info!(room_token = %self.room_token, "hanging up");
        self.leaving.cancel();

        if let Err(e) = (&mut self.event_task).await {
            warn!("event task ended abnormally: {e}");
        }
        if let Err(e) = (&mut self.ping_task).await {
            warn!("ping loop ended abnormally: {e}");
        }
        if let Err(e) = (&mut self.pull_task).await {
            warn!("pull loop ended abnormally: {e}");
        }

        if let Err(e) = self.backend.leave_call(&self.room_token).await {
            warn!("leave-call failed: {e}");
        }
        if let Err(e) = self.backend.leave_room(&self.room_token).await {
            warn!("leave-room failed: {e}");
        }

        self.phase = CallPhase::Terminated;
        debug!(room_token = %self.room_token, "call terminated");
    }
}

impl Drop for ActiveCall {
    fn drop(&mut self) {
        // Without a proper hangup the loops must still stop.
        self.leaving.cancel();
    }
}

/// State owned exclusively by the event task
struct SessionState {
    config: CallConfig,
    backend: Arc<dyn SignalingBackend>,
    engine: Arc<dyn MediaEngine>,
    room_token: String,
    local_session_id: String,
    registry: PeerRegistry,
    local_connection: Option<Box<dyn MediaConnection>>,
    render_tx: mpsc::UnboundedSender<RenderUpdate>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    leaving: CancellationToken,
}

impl SessionState {
    async fn run(mut self, mut event_rx: mpsc::UnboundedReceiver<SessionEvent>) {
        loop {
            tokio::select! {
                _ = self.leaving.cancelled() => break,
                event = event_rx.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
            }
        }
        self.teardown().await;
    }

    async fn handle(&mut self, event: SessionEvent) {
        if self.leaving.is_cancelled() {
            return;
        }
        match event {
            SessionEvent::Inbound(item) => self.handle_inbound(item).await,
            SessionEvent::Media(event) => self.handle_media(event),
        }
    }

    async fn handle_inbound(&mut self, item: Value) {
        match protocol::decode_item(&item, &self.config.room_type) {
            Ok(SignalingEvent::Roster(entries)) => {
                roster::reconcile(
                    &entries,
                    &self.local_session_id,
                    &mut self.registry,
                    &self.render_tx,
                    &self.leaving,
                )
                .await;
            }
            Ok(SignalingEvent::Negotiation(message)) => {
                let from = message.from.clone();
                if let Err(e) = router::route(message, &mut self.registry, &self.leaving).await {
                    warn!(from, "routing negotiation message failed: {e}");
                }
            }
            Err(e) => {
                // One bad item never affects its siblings in the batch.
                debug!("skipping signaling item: {e}");
            }
        }
    }

    fn handle_media(&self, event: MediaEvent) {
        let message = match event {
            MediaEvent::LocalDescription {
                session_id,
                kind,
                sdp,
            } => protocol::offer_answer_message(
                &self.local_session_id,
                &session_id,
                &self.config.room_type,
                kind,
                sdp,
                self.config.display_name.clone(),
            ),
            MediaEvent::LocalCandidate {
                session_id,
                candidate,
            } => protocol::candidate_message(
                &self.local_session_id,
                &session_id,
                &self.config.room_type,
                candidate,
            ),
            MediaEvent::EndOfCandidates { session_id } => protocol::end_of_candidates_message(
                &self.local_session_id,
                &session_id,
                &self.config.room_type,
            ),
        };

        match protocol::encode_envelope(&message, &self.local_session_id) {
            Ok(envelope) => self.spawn_push(envelope),
            Err(e) => warn!("could not encode outbound message: {e}"),
        }
    }

    /// Push one envelope without blocking the event task
    ///
    /// A push response can carry signaling items of its own (typically the
    /// remote answer); those are fed back into the event channel and take
    /// the same path as pulled items.
    fn spawn_push(&self, envelope: String) {
        let backend = self.backend.clone();
        let room_token = self.room_token.clone();
        let retries = self.config.request_retries;
        let event_tx = self.event_tx.clone();
        let leaving = self.leaving.clone();

        tokio::spawn(async move {
            if leaving.is_cancelled() {
                debug!("outbound message dropped, call is leaving");
                return;
            }
            match retrying(retries, || {
                backend.send_messages(&room_token, std::slice::from_ref(&envelope))
            })
            .await
            {
                Ok(items) => {
                    for item in items {
                        let _ = event_tx.send(SessionEvent::Inbound(item));
                    }
                }
                Err(e) => warn!("pushing signaling message failed after retries: {e}"),
            }
        });
    }

    async fn teardown(&mut self) {
        for session_id in self.registry.session_ids() {
            let _ = self.render_tx.send(RenderUpdate::Detach { session_id });
        }
        self.registry.destroy_all().await;

        if let Some(connection) = self.local_connection.take() {
            if let Err(e) = connection.close().await {
                warn!("closing local media connection failed: {e}");
            }
        }
        if let Err(e) = self.engine.release_local_media().await {
            warn!("releasing local media failed: {e}");
        }
        debug!("session state torn down");
    }
}
