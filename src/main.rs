use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod api;
mod config;
mod error;
mod feed;
mod refresh;
mod sources;
mod tabs;
mod view;

use api::AppState;
use config::Config;
use sources::HttpCricketApi;
use view::{FeedView, MatchDetailView};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let api = Arc::new(HttpCricketApi::new(
        &config.api_base_url,
        config.api_key.clone(),
        config.request_timeout(),
    )?);
    info!("Cricket data API: {}", config.api_base_url);

    let feed = Arc::new(
        FeedView::new(api.clone(), config.refresh_period())
            .with_request_timeout(config.request_timeout()),
    );
    feed.mount().await;
    let detail = MatchDetailView::new(api, config.refresh_period())
        .with_request_timeout(config.request_timeout());

    let app = api::router(AppState {
        feed: feed.clone(),
        detail: detail.clone(),
    });
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid listen address '{}'", config.listen_addr))?;
    info!("Feed API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    feed.unmount().await;
    detail.close().await;
    Ok(())
}
