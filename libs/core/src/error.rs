use thiserror::Error;

/// Failure to turn an inbound webhook request into an event batch.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Body and `x-line-signature` do not match under the channel secret.
    #[error("invalid webhook signature")]
    InvalidSignature,
    /// Body is not a well-formed webhook envelope.
    #[error("malformed webhook request: {0}")]
    MalformedRequest(String),
}

impl WebhookError {
    /// HTTP status the webhook endpoint answers with for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            WebhookError::InvalidSignature => 400,
            WebhookError::MalformedRequest(_) => 500,
        }
    }
}

/// The event originated from something other than a one-to-one chat with a user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported event source: {kind}")]
pub struct UnsupportedSource {
    pub kind: &'static str,
}
