//! HTTP signaling backend
//!
//! The signaling loops talk to the server through [`SignalingBackend`], a
//! plain request/response seam; [`HttpSignaling`] is the production
//! implementation. Retry policy lives in [`retrying`] so loops and the
//! one-shot push share one budget semantics: one initial attempt plus up
//! to `retries` extra attempts.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, warn};

/// Request/response operations exposed by the signaling server
#[async_trait]
pub trait SignalingBackend: Send + Sync {
    /// Join the room identified by `room_token`
    async fn join_room(&self, room_token: &str) -> Result<()>;

    /// Join the call; returns the server-assigned local session identifier
    async fn join_call(&self, room_token: &str) -> Result<String>;

    /// Keepalive ping for the call
    async fn ping_call(&self, room_token: &str) -> Result<()>;

    /// Fetch pending signaling items, in server order
    async fn pull_messages(&self, room_token: &str) -> Result<Vec<Value>>;

    /// Push a batch of encoded envelopes; the response may itself carry
    /// signaling items (the transport is bidirectional)
    async fn send_messages(&self, room_token: &str, messages: &[String]) -> Result<Vec<Value>>;

    /// Leave the call
    async fn leave_call(&self, room_token: &str) -> Result<()>;

    /// Leave the room
    async fn leave_room(&self, room_token: &str) -> Result<()>;
}

/// Run `op`, retrying up to `retries` extra times on failure
///
/// Returns the first success, or the last error once the budget is
/// exhausted. Intermediate failures are logged at debug level; the caller
/// decides what a terminal failure means.
pub async fn retrying<T, F, Fut>(retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error: Option<Error> = None;
    for attempt in 0..=retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                debug!(attempt, "request attempt failed: {e}");
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| Error::Transport("no attempts were made".to_string())))
}

/// HTTP implementation of [`SignalingBackend`]
///
/// Connects to a signaling server speaking the polling protocol: room and
/// call membership under `/room/{token}` and `/call/{token}`, signaling
/// pull/push under `/signaling`.
pub struct HttpSignaling {
    base_url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

/// Generic response envelope wrapping all server payloads
#[derive(Debug, Deserialize)]
struct Overall<T> {
    ocs: OverallBody<T>,
}

#[derive(Debug, Deserialize)]
struct OverallBody<T> {
    data: T,
}

/// Payload of a successful join-call response
#[derive(Debug, Deserialize)]
struct JoinCallData {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Payload of a pull/push response; the item list may be absent
#[derive(Debug, Default, Deserialize)]
struct SignalingData {
    #[serde(default)]
    signalings: Vec<Value>,
}

impl HttpSignaling {
    /// Create a new HTTP signaling backend
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server base URL (e.g., "https://cloud.example.com")
    /// * `auth_token` - Optional bearer token sent with every request
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an empty or non-HTTP URL.
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Result<Self> {
        let base_url = base_url.into();

        if base_url.is_empty() {
            return Err(Error::InvalidConfig(
                "signaling base_url cannot be empty".to_string(),
            ));
        }

        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "signaling base_url must start with http:// or https://, got: {base_url}"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
            client,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.client.request(method, url);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn expect_ok(builder: reqwest::RequestBuilder) -> Result<()> {
        let response = builder.send().await?;
        response.error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl SignalingBackend for HttpSignaling {
    async fn join_room(&self, room_token: &str) -> Result<()> {
        debug!(room_token, "joining room");
        Self::expect_ok(self.request(reqwest::Method::POST, &format!("/room/{room_token}"))).await
    }

    async fn join_call(&self, room_token: &str) -> Result<String> {
        debug!(room_token, "joining call");
        let response = self
            .request(reqwest::Method::POST, &format!("/call/{room_token}"))
            .send()
            .await?
            .error_for_status()?;
        let overall: Overall<JoinCallData> = response.json().await?;
        Ok(overall.ocs.data.session_id)
    }

    async fn ping_call(&self, room_token: &str) -> Result<()> {
        Self::expect_ok(self.request(reqwest::Method::POST, &format!("/call/{room_token}/ping")))
            .await
    }

    async fn pull_messages(&self, room_token: &str) -> Result<Vec<Value>> {
        let response = self
            .request(reqwest::Method::GET, "/signaling")
            .query(&[("token", room_token)])
            .send()
            .await?
            .error_for_status()?;
        let overall: Overall<SignalingData> = response.json().await?;
        Ok(overall.ocs.data.signalings)
    }

    async fn send_messages(&self, room_token: &str, messages: &[String]) -> Result<Vec<Value>> {
        // The server expects the batch as one JSON array in a form field.
        let batch = serde_json::to_string(messages)?;
        let response = self
            .request(reqwest::Method::POST, "/signaling")
            .query(&[("token", room_token)])
            .form(&[("messages", batch.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let overall: Overall<SignalingData> = response.json().await?;
        Ok(overall.ocs.data.signalings)
    }

    async fn leave_call(&self, room_token: &str) -> Result<()> {
        debug!(room_token, "leaving call");
        Self::expect_ok(self.request(reqwest::Method::DELETE, &format!("/call/{room_token}"))).await
    }

    async fn leave_room(&self, room_token: &str) -> Result<()> {
        debug!(room_token, "leaving room");
        if let Err(e) =
            Self::expect_ok(self.request(reqwest::Method::DELETE, &format!("/room/{room_token}")))
                .await
        {
            warn!("leave-room failed: {e}");
            return Err(e);
        }
        Ok(())
    }
}
