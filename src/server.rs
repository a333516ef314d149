//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the routing
//! snapshot and the forwarder), [`build_router`] for constructing the
//! Axum router with middleware layers, [`publish`] for swapping in a
//! reloaded routing table, and [`shutdown_signal`] for SIGTERM / Ctrl+C
//! handling.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::ConfigVersion;
use crate::proxy;
use crate::proxy::forward::Forwarder;
use crate::proxy::routing::RoutingTable;

/// One immutable routing snapshot and where it came from.
#[derive(Debug)]
pub struct LoadedTable {
    pub table: Arc<RoutingTable>,
    pub version: ConfigVersion,
    pub source_name: String,
    pub loaded_at: Instant,
}

impl LoadedTable {
    #[must_use]
    pub fn new(table: RoutingTable, version: ConfigVersion, source_name: impl Into<String>) -> Self {
        Self {
            table: Arc::new(table),
            version,
            source_name: source_name.into(),
            loaded_at: Instant::now(),
        }
    }
}

pub struct AppState {
    /// Readers `load()` a snapshot; reloads `store()` a new one. Never mutated in place.
    pub routes: ArcSwap<LoadedTable>,
    pub forwarder: Forwarder,
}

impl AppState {
    #[must_use]
    pub fn new(table: LoadedTable, forwarder: Forwarder) -> Self {
        Self {
            routes: ArcSwap::from_pointee(table),
            forwarder,
        }
    }
}

/// Replace the routing snapshot. In-flight requests keep the one they loaded.
pub fn publish(state: &AppState, table: LoadedTable) {
    state.routes.store(Arc::new(table));
}

/// `max_body` is the only request body cap; axum's extractor default is lifted.
pub fn build_router(state: Arc<AppState>, max_body: usize) -> Router {
    Router::new()
        .fallback(proxy::forward_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::disable())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
