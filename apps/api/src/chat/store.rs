//! In-memory registry of mounted chat sessions.
//!
//! Sessions live for the page session only; nothing survives a restart.
//! Each one carries the anti-forgery token issued when it was mounted.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::session::ChatSession;

pub struct SessionHandle {
    pub id: Uuid,
    pub token: String,
    pub session: Arc<Mutex<ChatSession>>,
}

impl SessionHandle {
    pub fn token_matches(&self, candidate: Option<&str>) -> bool {
        candidate.is_some_and(|t| t == self.token)
    }
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<SessionHandle>>>>,
    idle_limit: Duration,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(idle_minutes: i64, max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_limit: Duration::minutes(idle_minutes),
            max_sessions,
        }
    }

    /// Mounts a new session seeded with `greeting`, pruning idle ones first.
    /// At capacity, the least recently active idle session makes room.
    pub async fn mount(&self, greeting: &str) -> Arc<SessionHandle> {
        self.prune_idle().await;

        let handle = Arc::new(SessionHandle {
            id: Uuid::new_v4(),
            token: Uuid::new_v4().simple().to_string(),
            session: Arc::new(Mutex::new(ChatSession::mount(greeting))),
        });

        let mut sessions = self.sessions.write().await;
        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter_map(|(id, h)| {
                    let session = h.session.try_lock().ok()?;
                    if session.is_in_flight() {
                        return None;
                    }
                    Some((*id, session.last_active()))
                })
                .min_by_key(|(_, last_active)| *last_active)
                .map(|(id, _)| id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                    debug!("Evicted chat session {id} to stay under {}", self.max_sessions);
                }
                // Every session is mid-reply; admit this one over the cap.
                None => warn!("Session store full with every session in flight"),
            }
        }
        sessions.insert(handle.id, Arc::clone(&handle));
        debug!("Mounted chat session {}", handle.id);
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// True if `token` was issued to any live session.
    pub async fn is_issued_token(&self, token: &str) -> bool {
        self.sessions
            .read()
            .await
            .values()
            .any(|h| h.token == token)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drops sessions idle longer than the limit. Sessions with a request in
    /// flight (or otherwise locked) are kept.
    pub async fn prune_idle(&self) -> usize {
        let cutoff = Utc::now() - self.idle_limit;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|_, handle| match handle.session.try_lock() {
            Ok(session) => session.is_in_flight() || session.last_active() >= cutoff,
            Err(_) => true,
        });

        let removed = before - sessions.len();
        if removed > 0 {
            info!("Pruned {removed} idle chat sessions");
        }
        removed
    }
}
