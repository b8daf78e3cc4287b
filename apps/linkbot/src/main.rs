use anyhow::Result;
use axum::serve;
use linkbot::{BotConfig, build_app};
use linkbot_telemetry::{TelemetryConfig, init_telemetry};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_telemetry(TelemetryConfig::from_env(
        "linkbot",
        env!("CARGO_PKG_VERSION"),
    ))?;

    let config = BotConfig::from_env()?;
    info!(?config, "configuration loaded");
    let app = build_app(&config)?;

    let listener = TcpListener::bind(config.addr).await?;
    info!(
        addr = %config.addr,
        "linkbot listening on http://localhost:{}/",
        config.addr.port()
    );

    serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    info!("linkbot stopped");
    Ok(())
}
