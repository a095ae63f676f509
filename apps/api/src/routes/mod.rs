pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::chat::handlers as chat;
use crate::content::handlers as content;
use crate::render::handlers as page;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Site
        .route("/", get(page::handle_index))
        .route("/chat", post(chat::handle_chat_form))
        // Content API
        .route("/api/v1/content", get(content::handle_get_content))
        // Chat API
        .route("/api/v1/chat", post(chat::handle_proxy_chat))
        .route("/api/v1/sessions", post(chat::handle_create_session))
        .route("/api/v1/sessions/:id", get(chat::handle_get_session))
        .route("/api/v1/sessions/:id/messages", post(chat::handle_submit))
        .with_state(state)
}
