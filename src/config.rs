//! Configuration types for call session coordination

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration for a call session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Display name sent in offer/answer payloads (optional)
    pub display_name: Option<String>,

    /// Room type accepted and emitted on the wire (default: "video")
    pub room_type: String,

    /// Keepalive ping interval in milliseconds (default: 5000ms)
    pub ping_interval_ms: u64,

    /// Signaling pull interval in milliseconds (default: 1500ms)
    pub pull_interval_ms: u64,

    /// Retry budget per signaling request (default: 3)
    pub request_retries: u32,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            display_name: None,
            room_type: "video".to_string(),
            ping_interval_ms: 5000,
            pull_interval_ms: 1500,
            request_retries: 3,
        }
    }
}

impl CallConfig {
    /// Keepalive interval as a [`Duration`]
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Pull interval as a [`Duration`]
    pub fn pull_interval(&self) -> Duration {
        Duration::from_millis(self.pull_interval_ms)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `room_type` is empty
    /// - `ping_interval_ms` or `pull_interval_ms` is zero
    /// - `request_retries` exceeds 10
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.room_type.is_empty() {
            return Err(Error::InvalidConfig("room_type must not be empty".to_string()));
        }

        if self.ping_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "ping_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.pull_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "pull_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.request_retries > 10 {
            return Err(Error::InvalidConfig(format!(
                "request_retries must be in range 0-10, got {}",
                self.request_retries
            )));
        }

        Ok(())
    }
}
