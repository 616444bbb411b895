//! Nutrack - a self-hosted nutrition and fitness tracking API.
//!
//! # Overview
//!
//! Binds the HTTP API over a SQLite database. Users log food, meals,
//! exercise, water, and habits; the service reconciles calorie data,
//! maintains daily logging streaks, and serves per-day dashboards.
//!
//! # Configuration
//!
//! - `NUTRACK_PORT`: listen port (default 3000)
//! - `NUTRACK_DATABASE_URL`: SQLite connection string
//!   (default "sqlite:nutrack.db?mode=rwc")
//! - `RUST_LOG`: tracing filter, e.g. "nutrack=debug"

use std::env;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use nutrack::api::{AppState, router};
use nutrack::storage::Storage;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:nutrack.db?mode=rwc";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing with environment filter
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("nutrack=info".parse()?))
        .init();

    // Load configuration from environment
    let port: u16 = env::var("NUTRACK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let db_url = env::var("NUTRACK_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

    info!(port, db_url = %db_url, "Starting Nutrack server");

    // Initialize storage
    let storage = Storage::new(&db_url).await?;
    info!("Database initialized");

    // Create application state
    let state = AppState { storage };

    // Build router with request tracing
    let app = router(state).layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "Nutrack is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
