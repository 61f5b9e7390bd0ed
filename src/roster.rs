//! Roster reconciliation
//!
//! Compares the server-reported participant list against the peer session
//! registry and applies join/leave deltas. Deltas are computed into fresh
//! sets before anything is mutated; the registry is never changed while it
//! is being iterated.

use crate::media::RenderUpdate;
use crate::peer::registry::PeerRegistry;
use crate::signaling::protocol::RosterEntry;
use std::collections::BTreeSet;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Join/leave delta of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDelta {
    /// Sessions present on the server but unknown locally
    pub joined: Vec<String>,
    /// Sessions known locally but gone from the server
    pub left: Vec<String>,
}

/// Compute the delta between a roster snapshot and the known sessions
///
/// Only entries with `inCall == true` count as present, and the local
/// session identifier is excluded on both sides, so neither set can ever
/// contain it and the two sets are disjoint by construction. Results are
/// sorted for deterministic processing.
pub fn diff(entries: &[RosterEntry], local_session_id: &str, registry: &PeerRegistry) -> RosterDelta {
    let present: BTreeSet<&str> = entries
        .iter()
        .filter(|e| e.in_call && e.session_id != local_session_id)
        .map(|e| e.session_id.as_str())
        .collect();

    let known_ids = registry.session_ids();
    let known: BTreeSet<&str> = known_ids
        .iter()
        .map(String::as_str)
        .filter(|id| *id != local_session_id)
        .collect();

    RosterDelta {
        joined: present.difference(&known).map(|s| s.to_string()).collect(),
        left: known.difference(&present).map(|s| s.to_string()).collect(),
    }
}

/// Apply one roster snapshot to the registry
///
/// Departures are processed before arrivals, so a reused session id never
/// holds two live connections at once. Each departure also notifies the
/// renderer to drop that participant's surface. A no-op once the call is
/// leaving.
pub async fn reconcile(
    entries: &[RosterEntry],
    local_session_id: &str,
    registry: &mut PeerRegistry,
    render_tx: &mpsc::UnboundedSender<RenderUpdate>,
    leaving: &CancellationToken,
) -> RosterDelta {
    if leaving.is_cancelled() {
        debug!("roster snapshot ignored, call is leaving");
        return RosterDelta::default();
    }

    let delta = diff(entries, local_session_id, registry);

    for session_id in &delta.left {
        registry.destroy(session_id).await;
        let _ = render_tx.send(RenderUpdate::Detach {
            session_id: session_id.clone(),
        });
    }

    for session_id in &delta.joined {
        if let Err(e) = registry.get_or_create(session_id).await {
            warn!(session_id, "could not create peer session for joiner: {e}");
        }
    }

    delta
}
