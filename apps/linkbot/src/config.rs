//! Process configuration, read once at startup.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use linkbot_line_api::DEFAULT_API_BASE;
use url::Url;

use crate::router::Phrases;

pub const DEFAULT_PORT: u16 = 5000;

#[derive(Clone)]
pub struct BotConfig {
    pub channel_secret: String,
    pub channel_token: String,
    pub login_url: String,
    pub addr: SocketAddr,
    pub api_base: String,
    pub api_timeout: Option<Duration>,
    pub notify_link_failure: bool,
    pub phrases: Phrases,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let channel_secret = required(&lookup, "LINE_CHANNEL_SECRET")?;
        let channel_token = required(&lookup, "LINE_CHANNEL_TOKEN")?;
        let login_url = required(&lookup, "FRONT_END_LOGIN_URL")?;
        let parsed = Url::parse(&login_url)
            .with_context(|| format!("FRONT_END_LOGIN_URL is not a valid URL: {login_url}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!("FRONT_END_LOGIN_URL must use http or https, got {}", parsed.scheme());
        }

        let port = match optional(&lookup, "PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("invalid PORT `{raw}`"))?,
            None => DEFAULT_PORT,
        };
        let ip = match optional(&lookup, "BIND_ADDR") {
            Some(raw) => {
                IpAddr::from_str(&raw).with_context(|| format!("invalid BIND_ADDR `{raw}`"))?
            }
            None => IpAddr::from([0, 0, 0, 0]),
        };

        let api_base = optional(&lookup, "LINE_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into());
        let api_timeout = match optional(&lookup, "LINE_API_TIMEOUT_MS") {
            Some(raw) => {
                let millis = raw
                    .parse::<u64>()
                    .with_context(|| format!("invalid LINE_API_TIMEOUT_MS `{raw}`"))?;
                Some(Duration::from_millis(millis))
            }
            None => None,
        };
        let notify_link_failure = optional(&lookup, "LINK_FAILURE_REPLY")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        let mut phrases = Phrases::default();
        if let Some(link) = optional(&lookup, "LINK_TRIGGER_PHRASE") {
            phrases.link_trigger = link;
        }
        if let Some(unlink) = optional(&lookup, "UNLINK_TRIGGER_PHRASE") {
            phrases.unlink_trigger = unlink;
        }

        Ok(Self {
            channel_secret,
            channel_token,
            login_url,
            addr: SocketAddr::new(ip, port),
            api_base,
            api_timeout,
            notify_link_failure,
            phrases,
        })
    }
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("channel_secret", &"<redacted>")
            .field("channel_token", &"<redacted>")
            .field("login_url", &self.login_url)
            .field("addr", &self.addr)
            .field("api_base", &self.api_base)
            .field("api_timeout", &self.api_timeout)
            .field("notify_link_failure", &self.notify_link_failure)
            .field("phrases", &self.phrases)
            .finish()
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key) {
        Some(value) => Ok(value),
        None => bail!("{key} must be set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const BASE: &[(&str, &str)] = &[
        ("LINE_CHANNEL_SECRET", "secret"),
        ("LINE_CHANNEL_TOKEN", "token"),
        ("FRONT_END_LOGIN_URL", "https://example.com/login"),
    ];

    fn with(extra: &[(&'static str, &'static str)]) -> Vec<(&'static str, &'static str)> {
        let mut pairs = BASE.to_vec();
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn defaults_are_applied() {
        let cfg = BotConfig::from_lookup(lookup(BASE)).unwrap();
        assert_eq!(cfg.channel_secret, "secret");
        assert_eq!(cfg.channel_token, "token");
        assert_eq!(cfg.login_url, "https://example.com/login");
        assert_eq!(cfg.addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(cfg.api_base, DEFAULT_API_BASE);
        assert_eq!(cfg.api_timeout, None);
        assert!(!cfg.notify_link_failure);
        assert_eq!(cfg.phrases, Phrases::default());
    }

    #[test]
    fn missing_credentials_abort() {
        for key in ["LINE_CHANNEL_SECRET", "LINE_CHANNEL_TOKEN", "FRONT_END_LOGIN_URL"] {
            let pairs: Vec<_> = BASE.iter().copied().filter(|(k, _)| *k != key).collect();
            let err = BotConfig::from_lookup(lookup(&pairs)).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }

    #[test]
    fn blank_secret_counts_as_missing() {
        let pairs = with(&[("LINE_CHANNEL_SECRET", "   ")]);
        // later entries win in the map
        let err = BotConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("LINE_CHANNEL_SECRET"));
    }

    #[test]
    fn overrides_are_parsed() {
        let pairs = with(&[
            ("PORT", "8080"),
            ("BIND_ADDR", "127.0.0.1"),
            ("LINE_API_BASE", "http://localhost:9000"),
            ("LINE_API_TIMEOUT_MS", "2500"),
            ("LINK_FAILURE_REPLY", "TRUE"),
            ("LINK_TRIGGER_PHRASE", "link"),
            ("UNLINK_TRIGGER_PHRASE", "unlink"),
        ]);
        let cfg = BotConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.api_base, "http://localhost:9000");
        assert_eq!(cfg.api_timeout, Some(Duration::from_millis(2500)));
        assert!(cfg.notify_link_failure);
        assert_eq!(cfg.phrases.link_trigger, "link");
        assert_eq!(cfg.phrases.unlink_trigger, "unlink");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for extra in [
            ("PORT", "http"),
            ("BIND_ADDR", "localhost"),
            ("LINE_API_TIMEOUT_MS", "-1"),
            ("FRONT_END_LOGIN_URL", "not a url"),
            ("FRONT_END_LOGIN_URL", "ftp://example.com/login"),
        ] {
            let pairs = with(&[extra]);
            assert!(
                BotConfig::from_lookup(lookup(&pairs)).is_err(),
                "{extra:?} should be rejected"
            );
        }
    }

    #[test]
    fn debug_redacts_credentials() {
        let cfg = BotConfig::from_lookup(lookup(BASE)).unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("secret\""));
        assert!(!rendered.contains("\"token\""));
        assert!(rendered.contains("<redacted>"));
    }
}
