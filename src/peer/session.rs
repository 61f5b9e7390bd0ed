//! Per-remote-peer negotiation state

use crate::media::MediaConnection;
use crate::signaling::protocol::{IceCandidate, SdpKind};
use crate::Result;
use tracing::{debug, warn};

/// Negotiation progress of one peer session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    /// No description exchanged yet; candidates are buffered
    New,
    /// A remote description has been applied
    OfferOrAnswerExchanged,
    /// Media-level connectivity established
    Connected,
    /// Session torn down
    Closed,
}

/// This client's view of one remote participant
///
/// Owns the media connection handle exclusively; the handle is released
/// exactly once, on [`PeerSession::close`]. Candidates arriving before a
/// remote description are buffered and drained in receipt order.
pub struct PeerSession {
    session_id: String,
    display_name: Option<String>,
    state: NegotiationState,
    pending_candidates: Vec<IceCandidate>,
    buffering: bool,
    connection: Option<Box<dyn MediaConnection>>,
}

impl PeerSession {
    pub(crate) fn new(session_id: String, connection: Box<dyn MediaConnection>) -> Self {
        Self {
            session_id,
            display_name: None,
            state: NegotiationState::New,
            pending_candidates: Vec::new(),
            buffering: true,
            connection: Some(connection),
        }
    }

    /// Remote participant's session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current negotiation state
    pub fn state(&self) -> NegotiationState {
        self.state
    }

    /// Remote participant's display name, if an offer/answer carried one
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Record the display name carried by an offer/answer payload
    pub fn set_display_name(&mut self, nick: Option<String>) {
        if nick.is_some() {
            self.display_name = nick;
        }
    }

    /// Number of candidates currently buffered
    pub fn pending_candidate_count(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Apply the remote session description, then drain buffered candidates
    ///
    /// The buffer is cleared only after the description was accepted; a
    /// rejected description leaves the session untouched. Individual
    /// candidate failures during the drain are logged and skipped, matching
    /// the engine's own tolerance for stale candidates.
    pub async fn apply_remote_description(&mut self, kind: SdpKind, sdp: &str) -> Result<()> {
        let Some(connection) = self.connection.as_ref() else {
            debug!(session_id = %self.session_id, "remote description for closed session ignored");
            return Ok(());
        };
        connection.set_remote_description(kind, sdp).await?;

        self.buffering = false;
        self.flush_pending().await;

        if self.state == NegotiationState::New {
            self.state = NegotiationState::OfferOrAnswerExchanged;
        }
        Ok(())
    }

    /// Buffer or forward one remote ICE candidate
    pub async fn add_candidate(&mut self, candidate: IceCandidate) -> Result<()> {
        if self.buffering {
            self.pending_candidates.push(candidate);
            debug!(
                session_id = %self.session_id,
                pending = self.pending_candidates.len(),
                "buffered candidate until a remote description exists"
            );
            return Ok(());
        }

        if let Some(connection) = self.connection.as_ref() {
            connection.add_ice_candidate(&candidate).await?;
        }
        Ok(())
    }

    /// Handle an explicit end-of-candidates notice
    ///
    /// Drains whatever is buffered (a no-op when empty) and stops any
    /// further buffering.
    pub async fn end_of_candidates(&mut self) -> Result<()> {
        self.buffering = false;
        self.flush_pending().await;
        Ok(())
    }

    /// Mark media-level connectivity as established
    ///
    /// Driven by the embedding application when its media engine reports a
    /// connected transport.
    pub fn mark_connected(&mut self) {
        if self.state == NegotiationState::OfferOrAnswerExchanged {
            self.state = NegotiationState::Connected;
        }
    }

    /// Release the media connection handle; idempotent
    pub async fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                warn!(session_id = %self.session_id, "closing media connection failed: {e}");
            }
        }
        self.pending_candidates.clear();
        self.state = NegotiationState::Closed;
    }

    async fn flush_pending(&mut self) {
        if self.pending_candidates.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut self.pending_candidates);
        let Some(connection) = self.connection.as_ref() else {
            return;
        };
        for candidate in &pending {
            if let Err(e) = connection.add_ice_candidate(candidate).await {
                warn!(session_id = %self.session_id, "buffered candidate rejected: {e}");
            }
        }
    }
}
