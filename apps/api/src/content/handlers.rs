use axum::{extract::State, Json};

use crate::content::Portfolio;
use crate::state::AppState;

/// GET /api/v1/content
/// Returns the CV data the page and the assistant are built from.
pub async fn handle_get_content(State(state): State<AppState>) -> Json<Portfolio> {
    Json(state.content.portfolio().clone())
}
