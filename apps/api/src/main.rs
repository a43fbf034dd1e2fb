mod analyzers;
mod config;
mod db;
mod errors;
mod models;
mod orchestration;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analyzers::default_analyzers;
use crate::config::Config;
use crate::db::create_pool;
use crate::orchestration::context_manager::{spawn_sweeper, ContextManager};
use crate::orchestration::coordinator::{Coordinator, CoordinatorConfig};
use crate::orchestration::isolation::PgIsolationProvider;
use crate::orchestration::storage::PgStorage;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fitscore API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL (runs migrations)
    let db = create_pool(&config.database_url, config.db_max_connections).await?;

    // Execution contexts: schema-per-context isolation, swept in the background
    let provider = Arc::new(PgIsolationProvider::new(
        db.clone(),
        config.enable_schema_isolation,
    ));
    let contexts = Arc::new(ContextManager::new(provider));
    spawn_sweeper(
        Arc::clone(&contexts),
        config.context_sweep_interval,
        config.context_retention,
    );
    info!(
        schema_isolation = config.enable_schema_isolation,
        retention_hours = config.context_retention.num_hours(),
        "Context manager initialized"
    );

    let storage = Arc::new(PgStorage::new(db));
    let analyzers = default_analyzers();
    info!(analyzers = analyzers.len(), "Analyzers registered");

    let coordinator = Coordinator::new(
        analyzers,
        Arc::clone(&contexts),
        storage.clone(),
        CoordinatorConfig {
            task_timeout: config.analysis_timeout,
            ..CoordinatorConfig::default()
        },
    )?;

    // Build app state
    let state = AppState {
        config: config.clone(),
        coordinator: Arc::new(coordinator),
        contexts,
        storage,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
