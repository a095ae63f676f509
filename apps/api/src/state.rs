use std::sync::Arc;

use crate::chat::store::SessionStore;
use crate::chat::transport::ChatTransport;
use crate::config::Config;
use crate::content::ContentStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub content: Arc<ContentStore>,
    /// Direct (vendor streaming) or proxy transport, chosen from config at startup.
    pub transport: Arc<dyn ChatTransport>,
    pub sessions: SessionStore,
    pub config: Config,
}
