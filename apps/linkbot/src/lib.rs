//! LINE webhook receiver that echoes text and drives account linking.

pub mod config;
pub mod http;
pub mod linking;
pub mod reply;
pub mod request_id;
pub mod router;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use linkbot_line_api::{AccountLinkApi, HttpLineApi, MessagingApi};

pub use config::BotConfig;
pub use http::{AppState, build_router};
pub use linking::LinkingController;
pub use reply::ReplyDispatcher;
pub use router::{EventRouter, Phrases, RouteOutcome, SkipReason};

/// Builds the service against the real platform API.
pub fn build_app(config: &BotConfig) -> Result<Router> {
    let client = reqwest::Client::builder()
        .build()
        .context("failed to build http client")?;
    let api = HttpLineApi::new(client, &config.api_base, config.channel_token.clone())
        .context("invalid LINE api configuration")?
        .with_timeout(config.api_timeout);
    Ok(build_app_with_api(config, Arc::new(api)))
}

/// Builds the service against any platform client, e.g. a recording fake in tests.
pub fn build_app_with_api<A>(config: &BotConfig, api: Arc<A>) -> Router
where
    A: MessagingApi + AccountLinkApi + 'static,
{
    let accounts: Arc<dyn AccountLinkApi> = api.clone();
    let messaging: Arc<dyn MessagingApi> = api;

    let linking = LinkingController::new(accounts, config.login_url.clone())
        .with_failure_notice(config.notify_link_failure);
    let router = EventRouter::new(
        config.phrases.clone(),
        linking,
        ReplyDispatcher::new(messaging),
    );

    build_router(AppState {
        channel_secret: Arc::from(config.channel_secret.as_str()),
        router: Arc::new(router),
    })
}
