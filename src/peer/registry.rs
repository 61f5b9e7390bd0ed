//! Keyed collection of peer sessions
//!
//! The registry is the only owner of peer sessions and is mutated solely
//! from the call's event task, so it needs no interior locking.

use crate::media::MediaEngine;
use crate::peer::session::PeerSession;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of peer sessions, keyed by remote session identifier
///
/// Never holds two sessions for one identifier, and never an entry for the
/// local session's own identifier (the reconciler filters it out and
/// creation for it is rejected).
pub struct PeerRegistry {
    sessions: HashMap<String, PeerSession>,
    engine: Arc<dyn MediaEngine>,
    local_session_id: String,
}

impl PeerRegistry {
    /// Create an empty registry backed by the given media engine
    pub fn new(engine: Arc<dyn MediaEngine>, local_session_id: String) -> Self {
        Self {
            sessions: HashMap::new(),
            engine,
            local_session_id,
        }
    }

    /// Return the session for `session_id`, creating it on first reference
    ///
    /// Creation requests a fresh media connection from the engine (which
    /// attaches the local media stream) and registers the session in one
    /// step; a failed engine call leaves the registry unchanged.
    pub async fn get_or_create(&mut self, session_id: &str) -> Result<&mut PeerSession> {
        if session_id == self.local_session_id {
            return Err(Error::UnknownPeer(format!(
                "refusing to create a peer session for the local id {session_id}"
            )));
        }

        if !self.sessions.contains_key(session_id) {
            let connection = self.engine.create_connection(session_id).await?;
            info!(session_id, "created peer session");
            self.sessions.insert(
                session_id.to_string(),
                PeerSession::new(session_id.to_string(), connection),
            );
        }

        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::UnknownPeer(session_id.to_string()))
    }

    /// Non-creating lookup
    pub fn find(&self, session_id: &str) -> Option<&PeerSession> {
        self.sessions.get(session_id)
    }

    /// Non-creating mutable lookup
    pub fn find_mut(&mut self, session_id: &str) -> Option<&mut PeerSession> {
        self.sessions.get_mut(session_id)
    }

    /// Destroy the session for `session_id`, if present
    ///
    /// Idempotent: duplicate leave notifications are expected from polling,
    /// so an unknown identifier is a benign race, not an error. Returns
    /// whether a session was actually removed.
    pub async fn destroy(&mut self, session_id: &str) -> bool {
        match self.sessions.remove(session_id) {
            Some(mut session) => {
                session.close().await;
                info!(session_id, "destroyed peer session");
                true
            }
            None => {
                debug!(session_id, "destroy for unknown session ignored");
                false
            }
        }
    }

    /// Destroy every session; used on hangup
    pub async fn destroy_all(&mut self) {
        let ids: Vec<String> = self.sessions.keys().cloned().collect();
        for session_id in ids {
            self.destroy(&session_id).await;
        }
    }

    /// Identifiers of all current sessions
    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.keys().cloned().collect()
    }

    /// Number of current sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaConnection;
    use crate::signaling::protocol::{IceCandidate, SdpKind};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingEngine {
        created: Mutex<Vec<String>>,
        closed: Mutex<Vec<String>>,
    }

    struct CountingConnection {
        session_id: String,
        engine: Arc<CountingEngine>,
    }

    #[async_trait]
    impl MediaConnection for CountingConnection {
        async fn set_remote_description(&self, _kind: SdpKind, _sdp: &str) -> Result<()> {
            Ok(())
        }

        async fn add_ice_candidate(&self, _candidate: &IceCandidate) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.engine
                .closed
                .lock()
                .unwrap()
                .push(self.session_id.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl MediaEngine for Arc<CountingEngine> {
        async fn create_connection(&self, session_id: &str) -> Result<Box<dyn MediaConnection>> {
            self.created.lock().unwrap().push(session_id.to_string());
            Ok(Box::new(CountingConnection {
                session_id: session_id.to_string(),
                engine: self.clone(),
            }))
        }

        async fn release_local_media(&self) -> Result<()> {
            Ok(())
        }
    }

    fn registry_with_engine() -> (PeerRegistry, Arc<CountingEngine>) {
        let engine = Arc::new(CountingEngine::default());
        let registry = PeerRegistry::new(Arc::new(engine.clone()), "LOCAL".to_string());
        (registry, engine)
    }

    #[tokio::test]
    async fn test_get_or_create_is_lazy() {
        let (mut registry, engine) = registry_with_engine();

        registry.get_or_create("B").await.unwrap();
        registry.get_or_create("B").await.unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(engine.created.lock().unwrap().clone(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_local_session_never_registered() {
        let (mut registry, engine) = registry_with_engine();

        assert!(registry.get_or_create("LOCAL").await.is_err());
        assert!(registry.is_empty());
        assert!(engine.created.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (mut registry, engine) = registry_with_engine();

        registry.get_or_create("B").await.unwrap();
        assert!(registry.destroy("B").await);
        assert!(!registry.destroy("B").await);
        assert!(!registry.destroy("never-seen").await);

        assert!(registry.is_empty());
        assert_eq!(engine.closed.lock().unwrap().clone(), vec!["B"]);
    }

    #[tokio::test]
    async fn test_destroy_all_closes_every_connection() {
        let (mut registry, engine) = registry_with_engine();

        registry.get_or_create("B").await.unwrap();
        registry.get_or_create("C").await.unwrap();
        registry.destroy_all().await;

        assert!(registry.is_empty());
        let mut closed = engine.closed.lock().unwrap().clone();
        closed.sort();
        assert_eq!(closed, vec!["B", "C"]);
    }
}
