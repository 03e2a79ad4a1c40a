// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Duo-Highscore API Server
//!
//! Keeps the Duo API tokens fresh, polls highscores in the background and
//! serves the latest snapshot to the scoreboard frontend.

use anyhow::Context;
use duo_highscore::{
    config::Config,
    routes::create_router,
    services::{DuoClient, RefreshScheduler, SchedulerConfig, SnapshotCache, TokenStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, season = config.season, "Starting Duo-Highscore API");

    // No identity, no service
    let store = TokenStore::new(config.token_file.clone());
    let tokens = store.load().context("Failed to load API tokens")?;
    tracing::info!(path = %store.path().display(), "API tokens loaded");

    let client = DuoClient::new(&config).context("Failed to initialize Duo client")?;

    // Shared between the refresher (single writer) and request handlers
    let cache = SnapshotCache::new();

    let scheduler = RefreshScheduler::new(
        client,
        store,
        cache.clone(),
        tokens,
        SchedulerConfig::from(&config),
    );
    tokio::spawn(scheduler.run());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        cache,
    });

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("duo_highscore=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
