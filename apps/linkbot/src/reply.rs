use std::sync::Arc;

use linkbot_core::Message;
use linkbot_line_api::MessagingApi;
use linkbot_telemetry::{ReplyOutcome, record_reply, record_upstream_failure};
use tracing::{debug, warn};

/// Sends replies and swallows failures.
///
/// The webhook is acknowledged regardless of reply delivery, so errors are logged and counted
/// but never propagated. Exactly one attempt is made per call.
#[derive(Clone)]
pub struct ReplyDispatcher {
    api: Arc<dyn MessagingApi>,
}

impl ReplyDispatcher {
    pub fn new(api: Arc<dyn MessagingApi>) -> Self {
        Self { api }
    }

    /// Returns whether the platform accepted the reply.
    pub async fn send(&self, reply_token: &str, messages: Vec<Message>) -> bool {
        match self.api.reply(reply_token, &messages).await {
            Ok(()) => {
                record_reply(ReplyOutcome::Delivered);
                debug!(messages = messages.len(), "reply sent");
                true
            }
            Err(err) => {
                record_reply(ReplyOutcome::Failed);
                record_upstream_failure("reply");
                warn!(error = %err, messages = messages.len(), "reply could not be sent");
                false
            }
        }
    }
}
