//! Wire protocol for polling signaling
//!
//! Two layers travel over the HTTP signaling channel:
//!
//! - Raw signaling items, each a JSON object with an outer discriminator:
//!   `"usersInRoom"` carries the room roster, `"message"` carries a nested
//!   negotiation message.
//! - Outbound negotiation messages, wrapped in an envelope whose `fn` field
//!   is the *JSON-escaped serialized* negotiation message (a string, not an
//!   object), followed by `sessionId` and the constant `ev` discriminator.
//!
//! Payloads decode once, at this boundary, into [`NegotiationPayload`];
//! everything past the codec matches on the tagged union. A decode failure
//! on one item never affects its siblings in the same batch.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Outer envelope event discriminator for pushed messages
pub const ENVELOPE_EVENT: &str = "message";

/// Offer or answer, as carried in the wire `type` fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    /// Session description offer
    Offer,
    /// Session description answer
    Answer,
}

impl SdpKind {
    /// Canonical wire form (`"offer"` / `"answer"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            SdpKind::Offer => "offer",
            SdpKind::Answer => "answer",
        }
    }
}

/// One ICE candidate as exchanged on the wire and with the media engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    /// The candidate attribute line
    pub candidate: String,

    /// Media stream identification tag
    #[serde(rename = "sdpMid", skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Index of the media description the candidate belongs to
    #[serde(rename = "sdpMLineIndex", skip_serializing_if = "Option::is_none")]
    pub sdp_mline_index: Option<u32>,
}

/// Negotiation message payload in wire form
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Payload type; takes precedence over the message's own `type`
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Session description, preserved byte-exact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp: Option<String>,

    /// Sender display name (offer/answer only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nick: Option<String>,

    /// ICE candidate (candidate payloads only)
    #[serde(rename = "iceCandidate", skip_serializing_if = "Option::is_none")]
    pub ice_candidate: Option<IceCandidate>,
}

/// Negotiation message in wire form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingMessage {
    /// Sending session identifier
    #[serde(default)]
    pub from: String,

    /// Receiving session identifier
    #[serde(default)]
    pub to: String,

    /// Room type; anything but the configured type is rejected
    #[serde(rename = "roomType", default)]
    pub room_type: String,

    /// Message type; used only when the payload carries no type of its own
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Message payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePayload>,
}

/// One roster entry as reported by the server
///
/// The wire reports `inCall` as the string `"true"` / `"false"`; anything
/// but a case-insensitive `"true"` counts as not in the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Participant session identifier
    pub session_id: String,
    /// Whether the participant is currently in the call
    pub in_call: bool,
}

/// Fully decoded negotiation payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationPayload {
    /// Remote offer with the sender's display name
    Offer {
        /// Session description, byte-exact
        sdp: String,
        /// Sender display name
        nick: Option<String>,
    },
    /// Remote answer with the sender's display name
    Answer {
        /// Session description, byte-exact
        sdp: String,
        /// Sender display name
        nick: Option<String>,
    },
    /// Remote ICE candidate
    Candidate(IceCandidate),
    /// No further candidates will follow
    EndOfCandidates,
}

/// Fully decoded negotiation message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationMessage {
    /// Sending session identifier
    pub from: String,
    /// Receiving session identifier
    pub to: String,
    /// Decoded payload
    pub payload: NegotiationPayload,
}

/// One decoded signaling item
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// Server-reported room roster
    Roster(Vec<RosterEntry>),
    /// Negotiation message addressed to this client
    Negotiation(NegotiationMessage),
}

/// Envelope for one pushed negotiation message
///
/// Field order matters: receivers expect `fn`, `sessionId`, `ev`.
#[derive(Serialize)]
struct MessageEnvelope<'a> {
    #[serde(rename = "fn")]
    signaling_message: &'a str,
    #[serde(rename = "sessionId")]
    session_id: &'a str,
    ev: &'a str,
}

/// Encode one outbound negotiation message into its wire envelope
///
/// The inner message is serialized first and embedded as a JSON string, so
/// quotes, backslashes and control characters in the display name come out
/// escaped while non-ASCII text passes through untouched. The SDP is never
/// normalized.
pub fn encode_envelope(message: &SignalingMessage, local_session_id: &str) -> Result<String> {
    let serialized = serde_json::to_string(message)?;
    let envelope = MessageEnvelope {
        signaling_message: &serialized,
        session_id: local_session_id,
        ev: ENVELOPE_EVENT,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode one raw signaling item
///
/// # Errors
///
/// Returns [`Error::Decode`] for malformed items, unsupported room types
/// and unknown message types. Callers log the error and move on to the
/// next item in the batch.
pub fn decode_item(raw: &Value, room_type: &str) -> Result<SignalingEvent> {
    let kind = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Decode("signaling item without a type".to_string()))?;

    match kind {
        "usersInRoom" => {
            let data = raw
                .get("data")
                .ok_or_else(|| Error::Decode("usersInRoom item without data".to_string()))?;
            Ok(SignalingEvent::Roster(decode_roster(data)))
        }
        "message" => {
            let data = raw
                .get("data")
                .ok_or_else(|| Error::Decode("message item without data".to_string()))?;
            let message = decode_nested_message(data)?;
            decode_negotiation(message, room_type).map(SignalingEvent::Negotiation)
        }
        other => Err(Error::Decode(format!("unknown signaling item type: {other}"))),
    }
}

/// Parse the nested negotiation message blob
///
/// Pulled items carry the message as a JSON object; push responses may echo
/// it back as a serialized string. Both forms are accepted.
fn decode_nested_message(data: &Value) -> Result<SignalingMessage> {
    match data {
        Value::String(text) => Ok(serde_json::from_str(text)?),
        _ => Ok(serde_json::from_value(data.clone())?),
    }
}

fn decode_roster(data: &Value) -> Vec<RosterEntry> {
    let Some(items) = data.as_array() else {
        warn!("usersInRoom data is not a list, treating roster as empty");
        return Vec::new();
    };

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let Some(session_id) = item.get("sessionId").and_then(Value::as_str) else {
            warn!("skipping roster entry without a sessionId");
            continue;
        };
        let in_call = match item.get("inCall") {
            Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
            Some(Value::Bool(flag)) => *flag,
            _ => false,
        };
        entries.push(RosterEntry {
            session_id: session_id.to_string(),
            in_call,
        });
    }
    entries
}

/// Resolve the effective type and build the tagged payload
///
/// `payload.type` wins over the message's own `type` when both are present.
fn decode_negotiation(message: SignalingMessage, room_type: &str) -> Result<NegotiationMessage> {
    if message.room_type != room_type {
        return Err(Error::Decode(format!(
            "unsupported room type: {}",
            message.room_type
        )));
    }

    let payload = message.payload.unwrap_or_default();
    let effective = payload
        .kind
        .as_deref()
        .or(message.kind.as_deref())
        .ok_or_else(|| Error::Decode("negotiation message without a type".to_string()))?;

    let decoded = match effective {
        "offer" | "answer" => {
            let sdp = payload
                .sdp
                .ok_or_else(|| Error::Decode(format!("{effective} without sdp")))?;
            if effective == "offer" {
                NegotiationPayload::Offer {
                    sdp,
                    nick: payload.nick,
                }
            } else {
                NegotiationPayload::Answer {
                    sdp,
                    nick: payload.nick,
                }
            }
        }
        "candidate" => {
            let candidate = payload
                .ice_candidate
                .ok_or_else(|| Error::Decode("candidate without iceCandidate".to_string()))?;
            NegotiationPayload::Candidate(candidate)
        }
        "endOfCandidates" => NegotiationPayload::EndOfCandidates,
        other => {
            return Err(Error::Decode(format!("unknown message type: {other}")));
        }
    };

    Ok(NegotiationMessage {
        from: message.from,
        to: message.to,
        payload: decoded,
    })
}

/// Build the wire form of an outbound offer or answer
pub fn offer_answer_message(
    from: &str,
    to: &str,
    room_type: &str,
    kind: SdpKind,
    sdp: String,
    nick: Option<String>,
) -> SignalingMessage {
    SignalingMessage {
        from: from.to_string(),
        to: to.to_string(),
        room_type: room_type.to_string(),
        kind: Some(kind.as_str().to_string()),
        payload: Some(MessagePayload {
            kind: Some(kind.as_str().to_string()),
            sdp: Some(sdp),
            nick,
            ice_candidate: None,
        }),
    }
}

/// Build the wire form of an outbound ICE candidate
pub fn candidate_message(
    from: &str,
    to: &str,
    room_type: &str,
    candidate: IceCandidate,
) -> SignalingMessage {
    SignalingMessage {
        from: from.to_string(),
        to: to.to_string(),
        room_type: room_type.to_string(),
        kind: Some("candidate".to_string()),
        payload: Some(MessagePayload {
            kind: Some("candidate".to_string()),
            sdp: None,
            nick: None,
            ice_candidate: Some(candidate),
        }),
    }
}

/// Build the wire form of an outbound end-of-candidates notice
pub fn end_of_candidates_message(from: &str, to: &str, room_type: &str) -> SignalingMessage {
    SignalingMessage {
        from: from.to_string(),
        to: to.to_string(),
        room_type: room_type.to_string(),
        kind: Some("endOfCandidates".to_string()),
        payload: Some(MessagePayload {
            kind: Some("endOfCandidates".to_string()),
            sdp: None,
            nick: None,
            ice_candidate: None,
        }),
    }
}
