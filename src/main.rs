//! Velvet Roster Backend
//!
//! Keeps an in-memory mirror of the shared check-in collection and exposes it,
//! with secret-gated mutations, to the board's display layer over HTTP.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod remote;
mod roster;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::SecretGate;
use config::Config;
use db::SqliteCollection;
use models::ConnectionStatus;
use roster::{RosterStore, SnapshotStream};
use tokio::sync::watch;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RosterStore<SqliteCollection>>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Velvet Roster Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.uses_default_secret() {
        tracing::warn!(
            "Using the default shared secret (VELVET_SHARED_SECRET). It deters accidental edits only."
        );
    }

    // Initialize database and the roster collection
    let pool = db::init_database(&config.db_path).await?;
    let collection = Arc::new(SqliteCollection::open(pool, config.collection.clone()).await?);
    tracing::info!("Collection: {}", collection.name());

    // Start mirroring
    let store = Arc::new(RosterStore::new(
        collection,
        SecretGate::new(config.shared_secret.clone()),
    ));
    let snapshots = store.subscribe().await?;
    spawn_roster_monitor(snapshots, store.connection_changes());

    let state = AppState {
        store: Arc::clone(&store),
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.unsubscribe();
    tracing::info!("Server stopped");

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The secret is checked per mutation inside the store, not by a layer.
    let api_routes = Router::new()
        .route("/roster", get(api::list_records).post(api::add_record))
        .route(
            "/roster/{id}",
            get(api::get_record).delete(api::delete_record),
        )
        .route("/roster/{id}/cycle", post(api::cycle_status))
        .route("/connection", get(api::get_connection));

    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Log mirror updates and connection transitions until the subscription ends.
fn spawn_roster_monitor(
    mut snapshots: SnapshotStream,
    mut connection: watch::Receiver<ConnectionStatus>,
) {
    tokio::spawn(async move {
        while let Some(snapshot) = snapshots.next().await {
            tracing::debug!(
                revision = snapshot.revision,
                pending = snapshot.pending.len(),
                "Roster mirror holds {} records",
                snapshot.len()
            );
        }
    });

    tokio::spawn(async move {
        while connection.changed().await.is_ok() {
            let status = connection.borrow_and_update().clone();
            match status {
                ConnectionStatus::Interrupted { reason } => {
                    tracing::warn!("Roster feed interrupted: {}", reason)
                }
                other => tracing::info!("Roster connection: {:?}", other),
            }
        }
    });
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
