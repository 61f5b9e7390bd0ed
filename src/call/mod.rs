//! Call lifecycle and the loops that keep it alive

pub mod controller;
pub(crate) mod loops;

pub use controller::{ActiveCall, CallController, CallPhase, SessionEvent};
