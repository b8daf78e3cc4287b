//! Account linking flow.
//!
//! The link state itself lives on the platform. Each operation here is a single request and
//! reply driven by one inbound event, so the controller keeps nothing between calls.

use std::sync::Arc;

use linkbot_core::{Action, LinkOutcome, Message, Template};
use linkbot_line_api::AccountLinkApi;
use linkbot_telemetry::record_upstream_failure;
use tracing::{info, warn};

pub const LINK_PROMPT_ALT_TEXT: &str = "Buttons template";
pub const LINK_PROMPT_TITLE: &str = "アカウント連携開始";
pub const LINK_PROMPT_TEXT: &str = "連携を開始します。リンク先でログイン\nを行なってください。";
pub const LINK_PROMPT_LABEL: &str = "連携開始";
pub const LINK_SUCCEEDED: &str = "アカウント連携が完了しました。";
pub const LINK_FAILED: &str = "アカウント連携が失敗しました。";
pub const LINK_UNAVAILABLE: &str =
    "アカウント連携を開始できませんでした。時間をおいて再度お試しください。";
pub const UNLINK_SUCCEEDED: &str = "連携解除が完了しました。";
pub const UNLINK_FAILED: &str = "連携解除が失敗しました。";

#[derive(Clone)]
pub struct LinkingController {
    accounts: Arc<dyn AccountLinkApi>,
    login_url: String,
    notify_link_failure: bool,
}

impl LinkingController {
    pub fn new(accounts: Arc<dyn AccountLinkApi>, login_url: impl Into<String>) -> Self {
        Self {
            accounts,
            login_url: login_url.into(),
            notify_link_failure: false,
        }
    }

    /// Reply with [`LINK_UNAVAILABLE`] when no link token can be issued, instead of staying
    /// silent.
    pub fn with_failure_notice(mut self, enabled: bool) -> Self {
        self.notify_link_failure = enabled;
        self
    }

    /// External login URL carrying `link_token` as the `linkToken` query parameter.
    pub fn authorization_url(&self, link_token: &str) -> String {
        let separator = if self.login_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{separator}linkToken={}",
            self.login_url,
            urlencoding::encode(link_token)
        )
    }

    /// Issues a fresh link token and builds the login prompt.
    ///
    /// Returns `None` when the token cannot be issued and failure notices are off; the user
    /// retries by sending the trigger phrase again.
    pub async fn begin(&self, user_id: &str) -> Option<Message> {
        info!(user_id, "issuing link token");
        match self.accounts.issue_link_token(user_id).await {
            Ok(token) => {
                info!(user_id, "link token issued");
                Some(login_prompt(self.authorization_url(&token)))
            }
            Err(err) => {
                record_upstream_failure("issue_link_token");
                warn!(user_id, error = %err, "link token could not be issued");
                self.notify_link_failure
                    .then(|| Message::text(LINK_UNAVAILABLE))
            }
        }
    }

    /// Confirmation for the result reported by an account link event.
    pub fn on_link_result(&self, outcome: &LinkOutcome) -> Option<Message> {
        match outcome {
            LinkOutcome::Ok => {
                info!("account link completed");
                Some(Message::text(LINK_SUCCEEDED))
            }
            LinkOutcome::Failed => {
                info!("account link failed on the external site");
                Some(Message::text(LINK_FAILED))
            }
            LinkOutcome::Other(result) => {
                warn!(result = %result, "unrecognized account link result; no reply");
                None
            }
        }
    }

    /// Revokes the link and reports the outcome of this call.
    pub async fn unlink(&self, user_id: &str) -> Message {
        match self.accounts.revoke(user_id).await {
            Ok(()) => {
                info!(user_id, "account unlinked");
                Message::text(UNLINK_SUCCEEDED)
            }
            Err(err) => {
                record_upstream_failure("revoke");
                warn!(user_id, error = %err, "account unlink failed");
                Message::text(UNLINK_FAILED)
            }
        }
    }
}

fn login_prompt(uri: String) -> Message {
    Message::Template {
        alt_text: LINK_PROMPT_ALT_TEXT.into(),
        template: Template::Buttons {
            title: Some(LINK_PROMPT_TITLE.into()),
            text: LINK_PROMPT_TEXT.into(),
            actions: vec![Action::Uri {
                label: LINK_PROMPT_LABEL.into(),
                uri,
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkbot_line_api::{ApiCall, RecordingLineApi};
    use reqwest::StatusCode;

    fn controller(api: &RecordingLineApi, login_url: &str) -> LinkingController {
        LinkingController::new(Arc::new(api.clone()), login_url)
    }

    fn prompt_uri(message: &Message) -> &str {
        match message {
            Message::Template {
                template: Template::Buttons { actions, .. },
                ..
            } => match &actions[0] {
                Action::Uri { uri, .. } => uri,
            },
            other => panic!("expected buttons template, got {other:?}"),
        }
    }

    #[test]
    fn authorization_url_appends_token() {
        let api = RecordingLineApi::new();
        let linking = controller(&api, "https://example.com/login");
        assert_eq!(
            linking.authorization_url("abc123"),
            "https://example.com/login?linkToken=abc123"
        );
    }

    #[test]
    fn authorization_url_extends_existing_query() {
        let api = RecordingLineApi::new();
        let linking = controller(&api, "https://example.com/login?lang=ja");
        assert_eq!(
            linking.authorization_url("a b&c"),
            "https://example.com/login?lang=ja&linkToken=a%20b%26c"
        );
    }

    #[tokio::test]
    async fn begin_builds_prompt_with_fresh_token() {
        let api = RecordingLineApi::new();
        api.push_link_token("tok-1").push_link_token("tok-2");
        let linking = controller(&api, "https://example.com/login");

        let first = linking.begin("U1").await.expect("prompt");
        let second = linking.begin("U1").await.expect("prompt");
        assert_eq!(prompt_uri(&first), "https://example.com/login?linkToken=tok-1");
        assert_eq!(prompt_uri(&second), "https://example.com/login?linkToken=tok-2");
        assert_eq!(first.preview(), LINK_PROMPT_ALT_TEXT);
        assert_eq!(
            api.calls(),
            vec![
                ApiCall::IssueLinkToken {
                    user_id: "U1".into()
                },
                ApiCall::IssueLinkToken {
                    user_id: "U1".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn begin_is_silent_on_token_failure_by_default() {
        let api = RecordingLineApi::new();
        api.fail_next_link_token(StatusCode::INTERNAL_SERVER_ERROR);
        let linking = controller(&api, "https://example.com/login");
        assert!(linking.begin("U1").await.is_none());
    }

    #[tokio::test]
    async fn begin_can_report_token_failure() {
        let api = RecordingLineApi::new();
        api.fail_next_link_token(StatusCode::INTERNAL_SERVER_ERROR);
        let linking = controller(&api, "https://example.com/login").with_failure_notice(true);
        assert_eq!(
            linking.begin("U1").await,
            Some(Message::text(LINK_UNAVAILABLE))
        );
    }

    #[test]
    fn link_results_map_to_confirmations() {
        let api = RecordingLineApi::new();
        let linking = controller(&api, "https://example.com/login");
        assert_eq!(
            linking.on_link_result(&LinkOutcome::Ok),
            Some(Message::text(LINK_SUCCEEDED))
        );
        assert_eq!(
            linking.on_link_result(&LinkOutcome::Failed),
            Some(Message::text(LINK_FAILED))
        );
        assert_eq!(
            linking.on_link_result(&LinkOutcome::Other("expired".into())),
            None
        );
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn unlink_reports_each_call_independently() {
        let api = RecordingLineApi::new();
        api.succeed_next_revoke()
            .fail_next_revoke(StatusCode::NOT_FOUND);
        let linking = controller(&api, "https://example.com/login");
        assert_eq!(linking.unlink("U1").await, Message::text(UNLINK_SUCCEEDED));
        assert_eq!(linking.unlink("U1").await, Message::text(UNLINK_FAILED));
        assert_eq!(api.calls().len(), 2);
    }
}
