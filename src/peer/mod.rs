//! Peer session state and its registry

pub mod registry;
pub mod session;

pub use registry::PeerRegistry;
pub use session::{NegotiationState, PeerSession};
