use axum::{extract::State, middleware, routing::get, Json, Router};
use serde_json::{json, Value};
use tracing::warn;

use crate::{auth::require_auth, AppState};

const KEY_STATE: &str = "bot:portfolio:state";
const KEY_HISTORY: &str = "bot:portfolio:history";
const KEY_TRADE_HISTORY: &str = "bot:trade_history";
const KEY_STATS: &str = "bot:stats";
const KEY_LATEST_ANALYSIS: &str = "bot:latest_analysis";

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/portfolio", get(get_portfolio))
        .route("/api/portfolio/history", get(get_portfolio_history))
        .route("/api/trades", get(get_trades))
        .route("/api/stats", get(get_stats))
        .route("/api/analysis", get(get_analysis))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Read one published JSON snapshot back out of the KV store, returning
/// `null` rather than an error when the core hasn't published that key yet
/// (e.g. before the first trade) or the store is unreachable.
async fn read_snapshot(state: &AppState, key: &str) -> Value {
    match state.kv.get(key).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(key, error = %e, "published snapshot is not valid JSON");
            Value::Null
        }),
        Ok(None) => Value::Null,
        Err(e) => {
            warn!(key, error = %e, "KV read failed, serving null");
            Value::Null
        }
    }
}

async fn get_portfolio(State(state): State<AppState>) -> Json<Value> {
    Json(read_snapshot(&state, KEY_STATE).await)
}

async fn get_portfolio_history(State(state): State<AppState>) -> Json<Value> {
    Json(read_snapshot(&state, KEY_HISTORY).await)
}

async fn get_trades(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "trades": read_snapshot(&state, KEY_TRADE_HISTORY).await }))
}

async fn get_stats(State(state): State<AppState>) -> Json<Value> {
    Json(read_snapshot(&state, KEY_STATS).await)
}

async fn get_analysis(State(state): State<AppState>) -> Json<Value> {
    Json(read_snapshot(&state, KEY_LATEST_ANALYSIS).await)
}
