//! # fitness-auth
//!
//! Account registration and profile backend for the fitness app.
//!
//! ## Architecture
//!
//! - **Validation**: explicit [`validation::Validate`] schemas turning JSON bodies into typed records
//! - **Database**: SQLite via sqlx; users and their one-to-one profiles
//! - **HTTP**: Axum router with request IDs, tracing, and graceful shutdown
//!
//! The login endpoint is a placeholder that hands out a fixed token. Nothing
//! here checks credentials or enforces sessions.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

mod config;
mod db;
mod http;
mod validation;

use anyhow::Context;
use axum::serve;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Cli};
use crate::db::Database;
use crate::http::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli).context("failed to load configuration")?;
    init_logging(config.log_json).context("failed to initialize logging")?;

    info!(
        bind = %config.bind,
        database_url = %config.database.url,
        max_connections = config.database.max_connections,
        acquire_timeout = ?config.database.acquire_timeout,
        "configuration loaded"
    );

    let db = Database::connect(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;
    db.sync_schema()
        .await
        .context("failed to create database schema")?;
    info!("database ready");

    tracing::warn!("POST /auth/login is a placeholder and issues a fixed mock token");

    let app = router(AppState::new(db));
    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;

    let shutdown = tokio::signal::ctrl_c();
    info!(bind = %config.bind, "fitness-auth listening");

    serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown.await;
            info!("shutting down gracefully");
        })
        .await
        .context("server exited with error")
}

/// Initialize tracing subscriber with `RUST_LOG` env filter (default: `info`).
fn init_logging(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
    result.map_err(|err| anyhow::anyhow!("{err}"))
}
