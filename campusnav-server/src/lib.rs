//! HTTP front end for the campus navigation core: indoor paths, live route
//! tracking sessions and shuttle trips.

pub mod config;
pub mod error;
pub mod fetch;
pub mod routes;
pub mod session;

use std::sync::Arc;

use anyhow::Context;
use campusnav_core::indoor::{BuildingCache, FloorPlanCatalog};
use tokio::net::TcpListener;

pub use config::ServerConfig;
pub use routes::{AppState, create_router};

use crate::fetch::{HttpBusPositions, HttpDirectionsClient};
use crate::session::SessionStore;

/// Loads the floor plans, builds every building graph and wires the HTTP clients
pub fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let catalog = FloorPlanCatalog::from_path(&config.floor_plans)
        .with_context(|| format!("loading floor plans from {}", config.floor_plans.display()))?;
    let cache = Arc::new(BuildingCache::new(Arc::new(catalog)));
    let buildings = cache.warm_all().context("building indoor graphs")?;
    tracing::info!(buildings, "indoor graphs ready");
    if config.shuttle.schedule.is_empty() {
        tracing::warn!("shuttle schedule is empty, every shuttle request will be refused");
    }

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("creating HTTP client")?;

    Ok(AppState {
        cache,
        sessions: Arc::new(SessionStore::new()),
        routes: Arc::new(HttpDirectionsClient::new(
            client.clone(),
            config.directions.clone(),
        )),
        buses: Arc::new(HttpBusPositions::new(client, &config.shuttle)),
        shuttle: Arc::new(config.shuttle.clone()),
        now: routes::local_now,
    })
}

/// Serves until ctrl-c
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let sweeper = state
        .sessions
        .spawn_idle_sweeper(config.session_idle_timeout());
    let app = create_router(state, &config);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await
        .context("server error")?;

    sweeper.abort();
    Ok(())
}
