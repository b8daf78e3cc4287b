//! Outbound calls from the link bot to the LINE platform.
//!
//! Handlers only see the [`MessagingApi`] and [`AccountLinkApi`] traits. Production wiring uses
//! [`HttpLineApi`]; tests substitute [`RecordingLineApi`].
mod client;
mod error;
mod recording;

use async_trait::async_trait;
use linkbot_core::Message;

pub use client::{DEFAULT_API_BASE, HttpLineApi};
pub use error::LineApiError;
pub use recording::{ApiCall, RecordingLineApi};

/// Reply endpoint of the messaging API.
#[async_trait]
pub trait MessagingApi: Send + Sync {
    /// Sends `messages` in order as the reply to the event that issued `reply_token`.
    async fn reply(&self, reply_token: &str, messages: &[Message]) -> Result<(), LineApiError>;
}

/// Identity side of account linking.
#[async_trait]
pub trait AccountLinkApi: Send + Sync {
    /// Issues a fresh single-use link token for `user_id`.
    async fn issue_link_token(&self, user_id: &str) -> Result<String, LineApiError>;

    /// Revokes the link state held for `user_id`.
    async fn revoke(&self, user_id: &str) -> Result<(), LineApiError>;
}
