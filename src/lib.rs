//! # meshcall
//!
//! Call session coordination for one participant of a multi-party call
//! over polling HTTP signaling.
//!
//! The crate sits between a signaling server and a media engine: it joins
//! the room and the call, keeps a peer session per remote participant,
//! reconciles the server's roster against those sessions, decodes and
//! routes negotiation messages (offers, answers, ICE candidates) and
//! pushes the locally produced counterparts back out. The ICE/DTLS/SRTP
//! transport itself stays behind the [`media::MediaEngine`] seam.
//!
//! ## Architecture
//!
//! ```text
//! CallController::join
//!        |
//!        v
//!   ActiveCall ---- leaving: CancellationToken
//!        |
//!        +-- ping loop  --> SignalingBackend::ping_call
//!        +-- pull loop  --> SignalingBackend::pull_messages --+
//!        |                                                    v
//!        +-- event task <---- SessionEvent channel <----------+
//!              |  (sole owner of the PeerRegistry)        ^
//!              |                                          |
//!              +-- roster::reconcile / router::route      |
//!              +-- push task --> send_messages -----------+
//!              +-- RenderUpdate channel --> renderer
//! ```
//!
//! All session state is owned by the event task; the loops and push tasks
//! only hand it events over the channel, so there is exactly one writer
//! and no lock. Hangup cancels the token, waits for the event task to
//! destroy every peer session, then leaves the call and the room in that
//! order.
//!
//! ## Example
//!
//! ```no_run
//! use meshcall::{CallConfig, CallController, HttpSignaling};
//! use std::sync::Arc;
//!
//! # async fn run(engine: Arc<dyn meshcall::media::MediaEngine>) -> meshcall::Result<()> {
//! let backend = Arc::new(HttpSignaling::new("https://cloud.example.com", None)?);
//! let (controller, mut render_rx) =
//!     CallController::new(CallConfig::default(), backend, engine)?;
//!
//! let call = controller.join("room-token").await?;
//! // feed media engine events through call.event_sender(), consume render_rx
//! call.hangup().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod call;
pub mod config;
pub mod error;
pub mod media;
pub mod peer;
pub mod roster;
pub mod signaling;
pub mod transport;

pub use call::{ActiveCall, CallController, CallPhase, SessionEvent};
pub use config::CallConfig;
pub use error::{Error, Result};
pub use media::{MediaEvent, RenderUpdate};
pub use peer::{NegotiationState, PeerRegistry, PeerSession};
pub use roster::RosterDelta;
pub use signaling::{
    IceCandidate, NegotiationMessage, NegotiationPayload, RosterEntry, SdpKind, SignalingEvent,
    SignalingMessage,
};
pub use transport::{HttpSignaling, SignalingBackend};
