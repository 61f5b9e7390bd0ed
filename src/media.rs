//! Media engine and renderer seams
//!
//! The actual ICE/DTLS/SRTP transport, codec negotiation and capture
//! pipeline live behind [`MediaEngine`] / [`MediaConnection`]; this crate
//! only forwards session descriptions and candidates between the wire and
//! the engine. The engine reports its locally produced descriptions and
//! candidates as [`MediaEvent`]s, which drive the signaling push path.

use crate::signaling::protocol::{IceCandidate, SdpKind};
use crate::Result;
use async_trait::async_trait;

/// One peer's media-level connection, owned by its peer session
///
/// Implementations must make `close` idempotent; the session guarantees it
/// is invoked at most once per handle regardless.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    /// Apply the remote session description
    async fn set_remote_description(&self, kind: SdpKind, sdp: &str) -> Result<()>;

    /// Apply one remote ICE candidate
    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()>;

    /// Tear the connection down and release its resources
    async fn close(&self) -> Result<()>;
}

/// The media engine capability
///
/// The engine holds the locally captured media stream and attaches it to
/// every connection it hands out.
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Create a fresh connection bound to the given session identifier
    async fn create_connection(&self, session_id: &str) -> Result<Box<dyn MediaConnection>>;

    /// Release the locally captured media stream
    ///
    /// Called once on hangup; a second call must be a no-op.
    async fn release_local_media(&self) -> Result<()>;
}

/// Locally produced negotiation event, reported by the media engine
///
/// `session_id` names the remote peer whose connection produced the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// The engine produced a local offer or answer
    LocalDescription {
        /// Remote peer the description is addressed to
        session_id: String,
        /// Whether this is an offer or an answer
        kind: SdpKind,
        /// The session description
        sdp: String,
    },
    /// The engine produced a local ICE candidate
    LocalCandidate {
        /// Remote peer the candidate is addressed to
        session_id: String,
        /// The candidate
        candidate: IceCandidate,
    },
    /// The engine finished gathering candidates for a connection
    EndOfCandidates {
        /// Remote peer whose gathering completed
        session_id: String,
    },
}

/// Update for the rendering collaborator
///
/// Session-state mutation never touches surfaces directly; teardown
/// notifications flow over a channel and are consumed on the renderer's
/// own schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderUpdate {
    /// Drop the rendering surface of a departed participant
    Detach {
        /// Session identifier of the departed participant
        session_id: String,
    },
}
