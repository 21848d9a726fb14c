use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jenkins_pr_trigger::config::Config;
use jenkins_pr_trigger::server::{AppState, build_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jenkins_pr_trigger=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::parse();
    tracing::debug!(?config, "Loaded configuration");

    let orchestrator = config.orchestrator()?;
    let app_state = AppState::new(config.webhook_secret().to_vec(), orchestrator);
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        jenkins_url = %config.jenkins_url,
        trigger_job = %config.trigger_job,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
