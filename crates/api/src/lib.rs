mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::KvStore;

/// Shared application state injected into every route handler. The core
/// dispatcher is the only writer of the state this crate serves — the
/// dashboard only ever reads the KV snapshots the dispatcher publishes
/// (spec §6: the HTTP surface is an external collaborator of the core, not
/// part of it).
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub dashboard_token: String,
}

/// Build and run the Axum dashboard API.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = Router::new()
        .merge(routes::api_router(state.clone()))
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors);

    info!(%addr, "dashboard API listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind dashboard API on {addr}: {e}"));
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("dashboard API server error: {e}"));
}
