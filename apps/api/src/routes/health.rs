use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and chat transport.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "portfolio",
        "chat_transport": state.transport.name(),
        "sessions": state.sessions.len().await,
        "session_idle_minutes": state.config.session_idle_minutes,
        "max_sessions": state.config.max_sessions,
    }))
}
