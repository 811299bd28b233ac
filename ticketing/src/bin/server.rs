//! Ticketing HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Start Postgres
//! docker compose up -d
//!
//! # Run against the mock gateway
//! GATEWAY_MODE=mock cargo run --bin server
//! ```

use gatepass_core::environment::SystemClock;
use gatepass_postgres::PostgresStore;
use std::sync::Arc;
use std::time::Duration;
use ticketing::payment_gateway::build_gateway;
use ticketing::qr::SvgQrRenderer;
use ticketing::runtime::{Application, Sweeper};
use ticketing::server::{AppState, build_router};
use ticketing::{Config, metrics};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ticketing=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ticketing server...");

    let config = Arc::new(Config::from_env()?);
    tracing::info!(
        gateway = ?config.gateway.mode,
        purchase_cutoff = ?config.sales.purchase_cutoff,
        sweeper = config.sweeper.enabled(),
        "Configuration loaded"
    );

    let store = PostgresStore::connect(
        &config.database.url,
        config.database.max_connections,
        Duration::from_secs(config.database.connect_timeout),
    )
    .await?;
    store.migrate().await?;
    tracing::info!("Database migrations applied");
    let store = Arc::new(store);

    let gateway = build_gateway(&config.gateway)?;
    let qr = Arc::new(SvgQrRenderer::default());
    let clock = Arc::new(SystemClock);

    metrics::register_metrics();
    let prometheus = metrics::install_recorder();

    let state = AppState::build(store.clone(), gateway, qr, clock.clone(), &config, prometheus);

    let sweeper = config.sweeper.enabled().then(|| {
        Sweeper::new(
            store.clone(),
            Arc::clone(&state.reconciler),
            clock.clone(),
            config.sweeper,
        )
    });

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;

    Application::new(listener, router, sweeper, config).run().await?;
    Ok(())
}
