//! Signaling codec and message routing

pub mod protocol;
pub mod router;

pub use protocol::{
    IceCandidate, NegotiationMessage, NegotiationPayload, RosterEntry, SdpKind, SignalingEvent,
    SignalingMessage,
};
