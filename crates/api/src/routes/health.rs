use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint — no auth required. Reports reachability of the KV
/// store rather than engine internals, since this crate has no access to the
/// core's in-memory state (spec §6: the dashboard is an external collaborator).
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let kv_reachable = state.kv.get("bot:portfolio:state").await.is_ok();
    Json(json!({
        "status": "ok",
        "kv_reachable": kv_reachable,
    }))
}
