//! Dispatch of decoded negotiation messages to peer sessions

use crate::peer::registry::PeerRegistry;
use crate::signaling::protocol::{NegotiationMessage, NegotiationPayload, SdpKind};
use crate::Result;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Route one decoded negotiation message to the session it addresses
///
/// The peer session for `message.from` is created on demand for offers,
/// answers and candidates; an end-of-candidates notice for a never-seen
/// session is a benign no-op. Once the call is leaving the message is
/// dropped without touching any state.
pub async fn route(
    message: NegotiationMessage,
    registry: &mut PeerRegistry,
    leaving: &CancellationToken,
) -> Result<()> {
    if leaving.is_cancelled() {
        debug!(from = %message.from, "negotiation message dropped, call is leaving");
        return Ok(());
    }

    match message.payload {
        NegotiationPayload::Offer { sdp, nick } => {
            let session = registry.get_or_create(&message.from).await?;
            session.set_display_name(nick);
            session.apply_remote_description(SdpKind::Offer, &sdp).await
        }
        NegotiationPayload::Answer { sdp, nick } => {
            let session = registry.get_or_create(&message.from).await?;
            session.set_display_name(nick);
            session.apply_remote_description(SdpKind::Answer, &sdp).await
        }
        NegotiationPayload::Candidate(candidate) => {
            let session = registry.get_or_create(&message.from).await?;
            session.add_candidate(candidate).await
        }
        NegotiationPayload::EndOfCandidates => {
            match registry.find_mut(&message.from) {
                Some(session) => session.end_of_candidates().await,
                None => {
                    debug!(from = %message.from, "end-of-candidates for unknown session ignored");
                    Ok(())
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaConnection, MediaEngine};
    use crate::peer::session::NegotiationState;
    use crate::signaling::protocol::IceCandidate;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct SharedLog {
        calls: Mutex<Vec<String>>,
    }

    struct LoggingEngine {
        log: Arc<SharedLog>,
    }

    struct LoggingConnection {
        session_id: String,
        log: Arc<SharedLog>,
    }

    #[async_trait]
    impl MediaConnection for LoggingConnection {
        async fn set_remote_description(&self, kind: SdpKind, _sdp: &str) -> crate::Result<()> {
            self.log
                .calls
                .lock()
                .unwrap()
                .push(format!("{}:srd:{}", self.session_id, kind.as_str()));
            Ok(())
        }

        async fn add_ice_candidate(&self, candidate: &IceCandidate) -> crate::Result<()> {
            self.log
                .calls
                .lock()
                .unwrap()
                .push(format!("{}:cand:{}", self.session_id, candidate.candidate));
            Ok(())
        }

        async fn close(&self) -> crate::Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl MediaEngine for LoggingEngine {
        async fn create_connection(
            &self,
            session_id: &str,
        ) -> crate::Result<Box<dyn MediaConnection>> {
            Ok(Box::new(LoggingConnection {
                session_id: session_id.to_string(),
                log: self.log.clone(),
            }))
        }

        async fn release_local_media(&self) -> crate::Result<()> {
            Ok(())
        }
    }

    fn registry_with_log() -> (PeerRegistry, Arc<SharedLog>) {
        let log = Arc::new(SharedLog::default());
        let registry = PeerRegistry::new(
            Arc::new(LoggingEngine { log: log.clone() }),
            "LOCAL".to_string(),
        );
        (registry, log)
    }

    fn candidate_message(from: &str, tag: &str) -> NegotiationMessage {
        NegotiationMessage {
            from: from.to_string(),
            to: "LOCAL".to_string(),
            payload: NegotiationPayload::Candidate(IceCandidate {
                candidate: tag.to_string(),
                sdp_mid: Some("0".to_string()),
                sdp_mline_index: Some(0),
            }),
        }
    }

    #[tokio::test]
    async fn test_candidates_before_offer_flush_in_order() {
        let (mut registry, log) = registry_with_log();
        let leaving = CancellationToken::new();

        route(candidate_message("B", "c1"), &mut registry, &leaving)
            .await
            .unwrap();
        route(candidate_message("B", "c2"), &mut registry, &leaving)
            .await
            .unwrap();
        assert!(log.calls.lock().unwrap().is_empty());

        let offer = NegotiationMessage {
            from: "B".to_string(),
            to: "LOCAL".to_string(),
            payload: NegotiationPayload::Offer {
                sdp: "v=0\r\n".to_string(),
                nick: Some("bob".to_string()),
            },
        };
        route(offer, &mut registry, &leaving).await.unwrap();

        let calls = log.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["B:srd:offer", "B:cand:c1", "B:cand:c2"]);

        let session = registry.find("B").unwrap();
        assert_eq!(session.state(), NegotiationState::OfferOrAnswerExchanged);
        assert_eq!(session.display_name(), Some("bob"));
    }

    #[tokio::test]
    async fn test_end_of_candidates_for_unknown_session_is_noop() {
        let (mut registry, _log) = registry_with_log();
        let leaving = CancellationToken::new();

        let notice = NegotiationMessage {
            from: "ghost".to_string(),
            to: "LOCAL".to_string(),
            payload: NegotiationPayload::EndOfCandidates,
        };
        route(notice, &mut registry, &leaving).await.unwrap();
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_messages_dropped_while_leaving() {
        let (mut registry, log) = registry_with_log();
        let leaving = CancellationToken::new();
        leaving.cancel();

        route(candidate_message("B", "c1"), &mut registry, &leaving)
            .await
            .unwrap();

        assert!(registry.is_empty());
        assert!(log.calls.lock().unwrap().is_empty());
    }
}
