//! Axum route handlers for the chat API and the page's chat form.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Redirect, Response,
    },
    Form, Json,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::driver::{spawn_turn, submit};
use crate::chat::session::SessionSnapshot;
use crate::chat::transport::{ChatReply, ChatRequest, TOKEN_HEADER};
use crate::errors::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "portfolio_session";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub token: String,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub message: String,
    pub token: String,
}

fn header_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok())
}

/// Reads the session id from the `portfolio_session` cookie, if present and well-formed.
pub fn session_id_from_cookies(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value).ok())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chat
///
/// Stateless relay for non-streaming front-ends: `{message, history}` in,
/// `{text}` out. Requires a token issued with a mounted session.
pub async fn handle_proxy_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    match header_token(&headers) {
        Some(token) if state.sessions.is_issued_token(token).await => {}
        _ => return Err(AppError::Forbidden),
    }

    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }

    let request = ChatRequest {
        message: message.to_string(),
        history: request.history,
    };
    let text = state.transport.reply(request).await?;

    Ok(Json(ChatReply { text }))
}

/// POST /api/v1/sessions
///
/// Mounts a chat session: greeting only, nothing in flight.
pub async fn handle_create_session(State(state): State<AppState>) -> impl IntoResponse {
    let handle = state.sessions.mount(state.content.greeting()).await;
    let snapshot = handle.session.lock().await.snapshot();
    info!("Chat session {} mounted via API", handle.id);

    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: handle.id,
            token: handle.token.clone(),
            snapshot,
        }),
    )
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Chat session {id} not found")))?;
    let snapshot = handle.session.lock().await.snapshot();
    Ok(Json(snapshot))
}

/// POST /api/v1/sessions/:id/messages
///
/// Starts a turn and streams its progress as server-sent events
/// (`fragment`, then `done` or `error`). Blank input, or a submission while
/// the session is still answering, is ignored with 204.
pub async fn handle_submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<SubmitRequest>,
) -> Result<Response, AppError> {
    let handle = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Chat session {id} not found")))?;
    if !handle.token_matches(header_token(&headers)) {
        return Err(AppError::Forbidden);
    }

    let Some(turn) = handle.session.lock().await.begin_turn(&request.message) else {
        debug!("Ignored submission for chat session {id}");
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let (tx, rx) = mpsc::channel(32);
    spawn_turn(
        Arc::clone(&handle.session),
        Arc::clone(&state.transport),
        turn,
        Some(tx),
    );

    let events = ReceiverStream::new(rx)
        .map(|event| Event::default().event(event.name()).json_data(&event));
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// POST /chat
///
/// Form submission from the rendered page. Runs the turn to completion and
/// sends the visitor back to the bottom of the conversation.
pub async fn handle_chat_form(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<ChatForm>,
) -> Result<Redirect, AppError> {
    let handle = match session_id_from_cookies(&headers) {
        Some(id) => state.sessions.get(id).await,
        None => None,
    };
    // Expired or missing session: a fresh page load mounts a new one.
    let Some(handle) = handle else {
        return Ok(Redirect::to("/"));
    };
    if !handle.token_matches(Some(&form.token)) {
        return Err(AppError::Forbidden);
    }

    if submit(
        Arc::clone(&handle.session),
        Arc::clone(&state.transport),
        &form.message,
    )
    .await
    .is_none()
    {
        debug!("Ignored form submission for chat session {}", handle.id);
    }

    Ok(Redirect::to("/#chat-bottom"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_session_cookie_parsed_among_others() {
        let id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {SESSION_COOKIE}={id}; other=1")).unwrap(),
        );
        assert_eq!(session_id_from_cookies(&headers), Some(id));
    }

    #[test]
    fn test_malformed_session_cookie_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("portfolio_session=not-a-uuid"),
        );
        assert_eq!(session_id_from_cookies(&headers), None);
    }
}
