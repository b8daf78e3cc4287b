//! Inbound webhook model and decoder.
//!
//! A delivery is `{"destination": "...", "events": [...]}`. The envelope must be well formed, but
//! each element of `events` is decoded on its own: an element that cannot be understood becomes an
//! [`EventKind::Unknown`] in its original position instead of failing the whole delivery.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{UnsupportedSource, WebhookError};
use crate::signature::verify_signature;

/// One verified webhook delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackRequest {
    pub destination: Option<String>,
    pub events: Vec<InboundEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    pub webhook_event_id: Option<String>,
    /// Single-use token scoping a reply to this event.
    pub reply_token: Option<String>,
    pub source: EventSource,
    pub kind: EventKind,
}

impl InboundEvent {
    /// User id of a one-to-one chat source.
    pub fn user_id(&self) -> Result<&str, UnsupportedSource> {
        self.source.user_id()
    }

    /// Stable label used in logs and metrics.
    pub fn kind_label(&self) -> &'static str {
        match &self.kind {
            EventKind::Message(_) => "message",
            EventKind::AccountLink { .. } => "account_link",
            EventKind::Unknown { .. } => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Message(MessageContent),
    AccountLink {
        outcome: LinkOutcome,
        nonce: Option<String>,
    },
    /// Unrecognized event type, or an element that could not be decoded.
    Unknown { event_type: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text { id: Option<String>, text: String },
    Other { message_type: String },
}

/// Result of the out-of-band authorization reported by an account link event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Ok,
    Failed,
    Other(String),
}

impl LinkOutcome {
    pub fn from_result(result: &str) -> Self {
        match result {
            "ok" => LinkOutcome::Ok,
            "failed" => LinkOutcome::Failed,
            other => LinkOutcome::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LinkOutcome::Ok => "ok",
            LinkOutcome::Failed => "failed",
            LinkOutcome::Other(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    User {
        user_id: String,
    },
    Group {
        group_id: String,
        user_id: Option<String>,
    },
    Room {
        room_id: String,
        user_id: Option<String>,
    },
    Unknown,
}

impl EventSource {
    /// Only direct user chats are addressable for linking and echo replies.
    pub fn user_id(&self) -> Result<&str, UnsupportedSource> {
        match self {
            EventSource::User { user_id } => Ok(user_id),
            other => Err(UnsupportedSource {
                kind: other.kind_label(),
            }),
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            EventSource::User { .. } => "user",
            EventSource::Group { .. } => "group",
            EventSource::Room { .. } => "room",
            EventSource::Unknown => "unknown",
        }
    }
}

/// Verifies the signature and decodes the body in one step.
///
/// Signature problems are reported before anything is parsed.
pub fn parse_request(
    channel_secret: &str,
    signature: Option<&str>,
    body: &[u8],
) -> Result<CallbackRequest, WebhookError> {
    verify_signature(channel_secret, body, signature)?;
    decode_events(body)
}

/// Decodes an already verified request body.
pub fn decode_events(body: &[u8]) -> Result<CallbackRequest, WebhookError> {
    let envelope: WireEnvelope = serde_json::from_slice(body)
        .map_err(|err| WebhookError::MalformedRequest(err.to_string()))?;

    let events = envelope
        .events
        .iter()
        .enumerate()
        .map(|(index, raw)| match decode_event(raw) {
            Ok(event) => event,
            Err(err) => {
                let event_type = raw.get("type").and_then(Value::as_str).map(str::to_owned);
                warn!(
                    index,
                    event_type = event_type.as_deref().unwrap_or("<missing>"),
                    error = %err,
                    "webhook event could not be decoded; treating as unknown"
                );
                InboundEvent {
                    webhook_event_id: None,
                    reply_token: None,
                    source: EventSource::Unknown,
                    kind: EventKind::Unknown { event_type },
                }
            }
        })
        .collect();

    Ok(CallbackRequest {
        destination: envelope.destination,
        events,
    })
}

fn decode_event(raw: &Value) -> Result<InboundEvent, serde_json::Error> {
    let header = WireEventHeader::deserialize(raw)?;
    let kind = match header.event_type.as_str() {
        "message" => {
            let body = WireMessageBody::deserialize(raw)?;
            EventKind::Message(body.message.into_content()?)
        }
        "accountLink" => {
            let body = WireAccountLinkBody::deserialize(raw)?;
            EventKind::AccountLink {
                outcome: LinkOutcome::from_result(&body.link.result),
                nonce: body.link.nonce,
            }
        }
        other => {
            debug!(event_type = other, "unrecognized webhook event type");
            EventKind::Unknown {
                event_type: Some(header.event_type.clone()),
            }
        }
    };

    Ok(InboundEvent {
        webhook_event_id: header.webhook_event_id,
        reply_token: header.reply_token,
        source: header
            .source
            .map(EventSource::from)
            .unwrap_or(EventSource::Unknown),
        kind,
    })
}

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    destination: Option<String>,
    events: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEventHeader {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    webhook_event_id: Option<String>,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    source: Option<WireSource>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireSource {
    User {
        #[serde(rename = "userId")]
        user_id: String,
    },
    Group {
        #[serde(rename = "groupId")]
        group_id: String,
        #[serde(default, rename = "userId")]
        user_id: Option<String>,
    },
    Room {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(default, rename = "userId")]
        user_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl From<WireSource> for EventSource {
    fn from(source: WireSource) -> Self {
        match source {
            WireSource::User { user_id } => EventSource::User { user_id },
            WireSource::Group { group_id, user_id } => EventSource::Group { group_id, user_id },
            WireSource::Room { room_id, user_id } => EventSource::Room { room_id, user_id },
            WireSource::Unknown => EventSource::Unknown,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireMessageBody {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl WireMessage {
    fn into_content(self) -> Result<MessageContent, serde_json::Error> {
        if self.message_type != "text" {
            return Ok(MessageContent::Other {
                message_type: self.message_type,
            });
        }
        match self.text {
            Some(text) => Ok(MessageContent::Text { id: self.id, text }),
            None => Err(<serde_json::Error as serde::de::Error>::missing_field(
                "text",
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireAccountLinkBody {
    link: WireLink,
}

#[derive(Debug, Deserialize)]
struct WireLink {
    result: String,
    #[serde(default)]
    nonce: Option<String>,
}
