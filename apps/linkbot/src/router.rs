//! Per-event dispatch.
//!
//! Events of one delivery are handled strictly in order, one after another, so replies leave in
//! the order the platform batched them.

use linkbot_core::{EventKind, InboundEvent, LinkOutcome, Message, MessageContent};
use linkbot_telemetry::record_event;
use tracing::{Instrument, info, info_span, warn};

use crate::linking::LinkingController;
use crate::reply::ReplyDispatcher;

pub const DEFAULT_LINK_TRIGGER: &str = "連携する";
pub const DEFAULT_UNLINK_TRIGGER: &str = "連携解除";

/// Trigger phrases and the echo sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrases {
    pub link_trigger: String,
    pub unlink_trigger: String,
}

impl Default for Phrases {
    fn default() -> Self {
        Self {
            link_trigger: DEFAULT_LINK_TRIGGER.into(),
            unlink_trigger: DEFAULT_UNLINK_TRIGGER.into(),
        }
    }
}

impl Phrases {
    /// Exact, case-sensitive match on the trimmed text; the link trigger wins over unlink.
    pub fn classify(&self, text: &str) -> TextCommand {
        let text = text.trim();
        if text == self.link_trigger {
            TextCommand::Link
        } else if text == self.unlink_trigger {
            TextCommand::Unlink
        } else {
            TextCommand::Echo
        }
    }

    pub fn echo(&self, text: &str) -> String {
        format!("あなたは{text}と言いました。")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommand {
    Link,
    Unlink,
    Echo,
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Replied,
    ReplyFailed,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnsupportedSource,
    NonTextMessage,
    UnknownEvent,
    MissingReplyToken,
    LinkTokenUnavailable,
    UnrecognizedLinkResult,
}

#[derive(Clone)]
pub struct EventRouter {
    phrases: Phrases,
    linking: LinkingController,
    replies: ReplyDispatcher,
}

impl EventRouter {
    pub fn new(phrases: Phrases, linking: LinkingController, replies: ReplyDispatcher) -> Self {
        Self {
            phrases,
            linking,
            replies,
        }
    }

    pub async fn handle_batch(&self, events: &[InboundEvent]) -> Vec<RouteOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for (index, event) in events.iter().enumerate() {
            let span = info_span!(
                "webhook.event",
                index,
                kind = event.kind_label(),
                webhook_event_id = event.webhook_event_id.as_deref().unwrap_or("")
            );
            let outcome = self.handle_event(event).instrument(span).await;
            outcomes.push(outcome);
        }
        outcomes
    }

    pub async fn handle_event(&self, event: &InboundEvent) -> RouteOutcome {
        record_event(event.kind_label());
        let outcome = match &event.kind {
            EventKind::Message(MessageContent::Text { text, .. }) => {
                self.handle_text(event, text).await
            }
            EventKind::Message(MessageContent::Other { message_type }) => {
                info!(message_type = %message_type, "unsupported message content; no reply");
                RouteOutcome::Skipped(SkipReason::NonTextMessage)
            }
            EventKind::AccountLink { outcome, .. } => self.handle_link_result(event, outcome).await,
            EventKind::Unknown { event_type } => {
                info!(
                    event_type = event_type.as_deref().unwrap_or("<missing>"),
                    "unsupported event type; no reply"
                );
                RouteOutcome::Skipped(SkipReason::UnknownEvent)
            }
        };
        info!(outcome = ?outcome, "event handled");
        outcome
    }

    async fn handle_text(&self, event: &InboundEvent, text: &str) -> RouteOutcome {
        let user_id = match event.user_id() {
            Ok(user_id) => user_id,
            Err(err) => {
                warn!(error = %err, "text message from non-user source skipped");
                return RouteOutcome::Skipped(SkipReason::UnsupportedSource);
            }
        };
        let Some(reply_token) = event.reply_token.as_deref() else {
            warn!(user_id, "text message without reply token skipped");
            return RouteOutcome::Skipped(SkipReason::MissingReplyToken);
        };

        let message = match self.phrases.classify(text) {
            TextCommand::Link => match self.linking.begin(user_id).await {
                Some(message) => message,
                None => return RouteOutcome::Skipped(SkipReason::LinkTokenUnavailable),
            },
            TextCommand::Unlink => self.linking.unlink(user_id).await,
            TextCommand::Echo => Message::text(self.phrases.echo(text)),
        };
        self.reply(reply_token, message).await
    }

    async fn handle_link_result(&self, event: &InboundEvent, outcome: &LinkOutcome) -> RouteOutcome {
        let Some(message) = self.linking.on_link_result(outcome) else {
            return RouteOutcome::Skipped(SkipReason::UnrecognizedLinkResult);
        };
        let Some(reply_token) = event.reply_token.as_deref() else {
            warn!(result = outcome.as_str(), "account link event without reply token skipped");
            return RouteOutcome::Skipped(SkipReason::MissingReplyToken);
        };
        self.reply(reply_token, message).await
    }

    async fn reply(&self, reply_token: &str, message: Message) -> RouteOutcome {
        if self.replies.send(reply_token, vec![message]).await {
            RouteOutcome::Replied
        } else {
            RouteOutcome::ReplyFailed
        }
    }
}
