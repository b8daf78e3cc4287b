use std::time::{Duration, Instant};

use async_trait::async_trait;
use linkbot_core::{Message, ReplyRequest};
use metrics::{counter, histogram};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::Deserialize;

use crate::error::LineApiError;
use crate::{AccountLinkApi, MessagingApi};

pub const DEFAULT_API_BASE: &str = "https://api.line.me";

const ERROR_BODY_LIMIT: usize = 512;

/// `reqwest` implementation of the outbound capabilities.
///
/// The client is built once and shared by every request handler. Each call makes exactly one
/// attempt; nothing is retried here.
#[derive(Clone)]
pub struct HttpLineApi {
    client: Client,
    base_url: Url,
    channel_token: String,
    timeout: Option<Duration>,
}

impl HttpLineApi {
    pub fn new(
        client: Client,
        base_url: &str,
        channel_token: impl Into<String>,
    ) -> Result<Self, LineApiError> {
        let mut url = Url::parse(base_url)
            .map_err(|err| LineApiError::Config(format!("invalid api base `{base_url}`: {err}")))?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            client,
            base_url: url,
            channel_token: channel_token.into(),
            timeout: None,
        })
    }

    /// Bounds every outbound request. `None` leaves requests unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, LineApiError> {
        self.base_url
            .join(path)
            .map_err(|err| LineApiError::Config(format!("invalid endpoint `{path}`: {err}")))
    }

    fn user_endpoint(&self, user_id: &str, suffix: &str) -> Result<Url, LineApiError> {
        self.endpoint(&format!(
            "v2/bot/user/{}/{suffix}",
            urlencoding::encode(user_id)
        ))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .bearer_auth(&self.channel_token);
        match self.timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn execute(
        &self,
        endpoint: &'static str,
        builder: RequestBuilder,
    ) -> Result<reqwest::Response, LineApiError> {
        let started = Instant::now();
        let response = builder.send().await.map_err(|source| {
            counter!(
                "linkbot_line_api_errors_total",
                "kind" => "transport",
                "endpoint" => endpoint
            )
            .increment(1);
            LineApiError::Transport { endpoint, source }
        })?;

        let status = response.status();
        histogram!(
            "linkbot_line_api_roundtrip_seconds",
            "endpoint" => endpoint,
            "status" => status.as_str().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        if status.is_success() {
            return Ok(response);
        }

        counter!(
            "linkbot_line_api_errors_total",
            "kind" => "remote",
            "endpoint" => endpoint,
            "status" => status.as_str().to_string()
        )
        .increment(1);
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable>".into());
        Err(LineApiError::Remote {
            endpoint,
            status,
            message: truncate(body, ERROR_BODY_LIMIT),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkTokenResponse {
    link_token: String,
}

#[async_trait]
impl MessagingApi for HttpLineApi {
    async fn reply(&self, reply_token: &str, messages: &[Message]) -> Result<(), LineApiError> {
        let url = self.endpoint("v2/bot/message/reply")?;
        let body = ReplyRequest {
            reply_token: reply_token.to_string(),
            messages: messages.to_vec(),
        };
        self.execute("message.reply", self.request(Method::POST, url).json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AccountLinkApi for HttpLineApi {
    async fn issue_link_token(&self, user_id: &str) -> Result<String, LineApiError> {
        let endpoint = "user.link_token";
        let url = self.user_endpoint(user_id, "linkToken")?;
        let response = self
            .execute(endpoint, self.request(Method::POST, url))
            .await?;
        let body: LinkTokenResponse = response.json().await.map_err(|source| {
            counter!(
                "linkbot_line_api_errors_total",
                "kind" => "decode",
                "endpoint" => endpoint
            )
            .increment(1);
            LineApiError::Decode { endpoint, source }
        })?;
        Ok(body.link_token)
    }

    async fn revoke(&self, user_id: &str) -> Result<(), LineApiError> {
        let url = self.user_endpoint(user_id, "richmenu")?;
        self.execute("user.revoke", self.request(Method::DELETE, url))
            .await?;
        Ok(())
    }
}

fn truncate(mut body: String, limit: usize) -> String {
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    body.truncate(end);
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base: &str) -> HttpLineApi {
        HttpLineApi::new(Client::new(), base, "token").unwrap()
    }

    #[test]
    fn endpoints_resolve_against_bare_host() {
        let api = api("https://api.line.me");
        assert_eq!(
            api.endpoint("v2/bot/message/reply").unwrap().as_str(),
            "https://api.line.me/v2/bot/message/reply"
        );
    }

    #[test]
    fn endpoints_keep_base_path_prefix() {
        let api = api("http://127.0.0.1:9000/mock");
        assert_eq!(
            api.user_endpoint("U1", "linkToken").unwrap().as_str(),
            "http://127.0.0.1:9000/mock/v2/bot/user/U1/linkToken"
        );
    }

    #[test]
    fn user_ids_are_percent_encoded() {
        let api = api("https://api.line.me/");
        assert_eq!(
            api.user_endpoint("U 1/../x", "richmenu").unwrap().as_str(),
            "https://api.line.me/v2/bot/user/U%201%2F..%2Fx/richmenu"
        );
    }

    #[test]
    fn rejects_invalid_base() {
        assert!(matches!(
            HttpLineApi::new(Client::new(), "not a url", "token"),
            Err(LineApiError::Config(_))
        ));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let body = "連".repeat(300);
        let cut = truncate(body, ERROR_BODY_LIMIT);
        assert!(cut.len() <= ERROR_BODY_LIMIT);
        assert!(cut.chars().all(|c| c == '連'));
        assert_eq!(truncate("short".into(), ERROR_BODY_LIMIT), "short");
    }
}
