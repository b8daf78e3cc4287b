use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use linkbot_core::Message;
use reqwest::StatusCode;

use crate::error::LineApiError;
use crate::{AccountLinkApi, MessagingApi};

/// One outbound call observed by [`RecordingLineApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Reply {
        reply_token: String,
        messages: Vec<Message>,
    },
    IssueLinkToken {
        user_id: String,
    },
    Revoke {
        user_id: String,
    },
}

#[derive(Default)]
struct RecordingState {
    calls: Vec<ApiCall>,
    link_tokens: VecDeque<Result<String, StatusCode>>,
    revocations: VecDeque<Result<(), StatusCode>>,
    replies: VecDeque<Result<(), StatusCode>>,
    issued: usize,
}

/// In-memory stand-in for the LINE platform.
///
/// Every call is recorded in order. Results are scripted per operation; once a script runs out,
/// calls succeed and link tokens are numbered `link-token-1`, `link-token-2`, ...
#[derive(Clone, Default)]
pub struct RecordingLineApi {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingLineApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RecordingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_link_token(&self, token: impl Into<String>) -> &Self {
        self.lock().link_tokens.push_back(Ok(token.into()));
        self
    }

    pub fn fail_next_link_token(&self, status: StatusCode) -> &Self {
        self.lock().link_tokens.push_back(Err(status));
        self
    }

    pub fn fail_next_revoke(&self, status: StatusCode) -> &Self {
        self.lock().revocations.push_back(Err(status));
        self
    }

    pub fn succeed_next_revoke(&self) -> &Self {
        self.lock().revocations.push_back(Ok(()));
        self
    }

    pub fn fail_next_reply(&self, status: StatusCode) -> &Self {
        self.lock().replies.push_back(Err(status));
        self
    }

    /// All calls observed so far, oldest first.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Reply calls only, as `(reply_token, messages)`.
    pub fn replies(&self) -> Vec<(String, Vec<Message>)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                ApiCall::Reply {
                    reply_token,
                    messages,
                } => Some((reply_token.clone(), messages.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn take_calls(&self) -> Vec<ApiCall> {
        std::mem::take(&mut self.lock().calls)
    }
}

fn scripted_failure(endpoint: &'static str, status: StatusCode) -> LineApiError {
    LineApiError::Remote {
        endpoint,
        status,
        message: format!("scripted failure {status}"),
    }
}

#[async_trait]
impl MessagingApi for RecordingLineApi {
    async fn reply(&self, reply_token: &str, messages: &[Message]) -> Result<(), LineApiError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Reply {
            reply_token: reply_token.to_string(),
            messages: messages.to_vec(),
        });
        match state.replies.pop_front() {
            Some(Err(status)) => Err(scripted_failure("message.reply", status)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AccountLinkApi for RecordingLineApi {
    async fn issue_link_token(&self, user_id: &str) -> Result<String, LineApiError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::IssueLinkToken {
            user_id: user_id.to_string(),
        });
        match state.link_tokens.pop_front() {
            Some(Ok(token)) => Ok(token),
            Some(Err(status)) => Err(scripted_failure("user.link_token", status)),
            None => {
                state.issued += 1;
                Ok(format!("link-token-{}", state.issued))
            }
        }
    }

    async fn revoke(&self, user_id: &str) -> Result<(), LineApiError> {
        let mut state = self.lock();
        state.calls.push(ApiCall::Revoke {
            user_id: user_id.to_string(),
        });
        match state.revocations.pop_front() {
            Some(Err(status)) => Err(scripted_failure("user.revoke", status)),
            _ => Ok(()),
        }
    }
}
