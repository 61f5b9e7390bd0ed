//! Shared mocks for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use meshcall::media::{MediaConnection, MediaEngine};
use meshcall::{Error, IceCandidate, Result, SdpKind, SignalingBackend};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Scripted response for one pull iteration
pub enum PullStep {
    Items(Vec<Value>),
    Fail,
}

/// Signaling backend with scripted pull batches and recorded traffic
///
/// Once the pull script is exhausted every further pull returns an empty
/// batch, so loops keep running quietly until the test hangs up.
#[derive(Default)]
pub struct MockBackend {
    pub calls: Mutex<Vec<String>>,
    pub pull_script: Mutex<VecDeque<PullStep>>,
    pub push_responses: Mutex<VecDeque<Vec<Value>>>,
    pub pushed: Mutex<Vec<String>>,
    pub fail_pings: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_pull(&self, step: PullStep) {
        self.pull_script.lock().unwrap().push_back(step);
    }

    pub fn script_push_response(&self, items: Vec<Value>) {
        self.push_responses.lock().unwrap().push_back(items);
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    fn record(&self, name: &str) {
        self.calls.lock().unwrap().push(name.to_string());
    }
}

#[async_trait]
impl SignalingBackend for MockBackend {
    async fn join_room(&self, _room_token: &str) -> Result<()> {
        self.record("join_room");
        Ok(())
    }

    async fn join_call(&self, _room_token: &str) -> Result<String> {
        self.record("join_call");
        Ok("LOCAL".to_string())
    }

    async fn ping_call(&self, _room_token: &str) -> Result<()> {
        self.record("ping");
        if self.fail_pings.load(Ordering::SeqCst) {
            Err(Error::Transport("ping rejected".to_string()))
        } else {
            Ok(())
        }
    }

    async fn pull_messages(&self, _room_token: &str) -> Result<Vec<Value>> {
        self.record("pull");
        match self.pull_script.lock().unwrap().pop_front() {
            Some(PullStep::Items(items)) => Ok(items),
            Some(PullStep::Fail) => Err(Error::Transport("pull rejected".to_string())),
            None => Ok(Vec::new()),
        }
    }

    async fn send_messages(&self, _room_token: &str, messages: &[String]) -> Result<Vec<Value>> {
        self.record("push");
        self.pushed.lock().unwrap().extend_from_slice(messages);
        Ok(self
            .push_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default())
    }

    async fn leave_call(&self, _room_token: &str) -> Result<()> {
        self.record("leave_call");
        Ok(())
    }

    async fn leave_room(&self, _room_token: &str) -> Result<()> {
        self.record("leave_room");
        Ok(())
    }
}

/// Media engine recording every connection-level operation
#[derive(Default)]
pub struct MockEngine {
    pub created: Mutex<Vec<String>>,
    pub closed: Arc<Mutex<Vec<String>>>,
    pub ops: Arc<Mutex<Vec<String>>>,
    pub released: AtomicUsize,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created_sessions(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn closed_sessions(&self) -> Vec<String> {
        self.closed.lock().unwrap().clone()
    }

    pub fn connection_ops(&self) -> Vec<String> {
        self.ops.lock().unwrap().clone()
    }
}

pub struct MockConnection {
    session_id: String,
    closed: Arc<Mutex<Vec<String>>>,
    ops: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl MediaConnection for MockConnection {
    async fn set_remote_description(&self, kind: SdpKind, _sdp: &str) -> Result<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("{}:srd:{}", self.session_id, kind.as_str()));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: &IceCandidate) -> Result<()> {
        self.ops
            .lock()
            .unwrap()
            .push(format!("{}:cand:{}", self.session_id, candidate.candidate));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.lock().unwrap().push(self.session_id.clone());
        Ok(())
    }
}

#[async_trait]
impl MediaEngine for MockEngine {
    async fn create_connection(&self, session_id: &str) -> Result<Box<dyn MediaConnection>> {
        self.created.lock().unwrap().push(session_id.to_string());
        Ok(Box::new(MockConnection {
            session_id: session_id.to_string(),
            closed: self.closed.clone(),
            ops: self.ops.clone(),
        }))
    }

    async fn release_local_media(&self) -> Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Raw roster item as it comes off the wire
pub fn roster_item(entries: &[(&str, &str)]) -> Value {
    let data: Vec<Value> = entries
        .iter()
        .map(|(session_id, in_call)| json!({ "sessionId": session_id, "inCall": in_call }))
        .collect();
    json!({ "type": "usersInRoom", "data": data })
}

/// Raw negotiation message item carrying an offer
pub fn offer_item(from: &str, to: &str, sdp: &str, nick: &str) -> Value {
    json!({
        "type": "message",
        "data": {
            "from": from,
            "to": to,
            "roomType": "video",
            "type": "offer",
            "payload": { "type": "offer", "sdp": sdp, "nick": nick }
        }
    })
}

/// Raw negotiation message item carrying an answer
pub fn answer_item(from: &str, to: &str, sdp: &str) -> Value {
    json!({
        "type": "message",
        "data": {
            "from": from,
            "to": to,
            "roomType": "video",
            "type": "answer",
            "payload": { "type": "answer", "sdp": sdp }
        }
    })
}

/// Raw negotiation message item carrying one ICE candidate
pub fn candidate_item(from: &str, to: &str, candidate: &str) -> Value {
    json!({
        "type": "message",
        "data": {
            "from": from,
            "to": to,
            "roomType": "video",
            "type": "candidate",
            "payload": {
                "type": "candidate",
                "iceCandidate": { "candidate": candidate, "sdpMid": "0", "sdpMLineIndex": 0 }
            }
        }
    })
}
