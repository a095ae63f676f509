use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::{Html, IntoResponse},
};
use chrono::{Datelike, Utc};
use tracing::debug;

use crate::chat::handlers::{session_id_from_cookies, SESSION_COOKIE};
use crate::render::{render_page, ChatPanel};
use crate::state::AppState;

/// GET /
///
/// Renders the one-page site. Resumes the visitor's chat session from the
/// cookie when it is still live, otherwise mounts a fresh one.
pub async fn handle_index(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let existing = match session_id_from_cookies(&headers) {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };
    let handle = match existing {
        Some(handle) => handle,
        None => {
            let handle = state.sessions.mount(state.content.greeting()).await;
            debug!("Mounted chat session {} for page view", handle.id);
            handle
        }
    };

    let snapshot = handle.session.lock().await.snapshot();
    let page = render_page(
        state.content.portfolio(),
        &ChatPanel {
            snapshot: &snapshot,
            token: &handle.token,
        },
        Utc::now().year(),
    );

    let mut response_headers = HeaderMap::new();
    let cookie = format!(
        "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
        handle.id
    );
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response_headers.insert(header::SET_COOKIE, value);
    }

    (response_headers, Html(page))
}
