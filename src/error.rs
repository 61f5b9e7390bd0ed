//! Error types for call session coordination

use thiserror::Error;

/// Result type alias for meshcall operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for call session coordination
///
/// Loop-level failures (`Transport`, `Decode`) are handled locally by the
/// signaling loops and never abort an established call. Only `Lifecycle`
/// errors propagate to the caller of [`crate::call::CallController`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration validation error
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request failed after exhausting its retry budget
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed signaling item; the item is skipped, its siblings are not
    #[error("malformed signaling item: {0}")]
    Decode(String),

    /// Negotiation message references a session that cannot be resolved
    #[error("unknown peer session: {0}")]
    UnknownPeer(String),

    /// Call establishment (join-room / join-call) failure
    #[error("call lifecycle error: {0}")]
    Lifecycle(String),

    /// Media engine refused an operation
    #[error("media engine error: {0}")]
    Media(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}
