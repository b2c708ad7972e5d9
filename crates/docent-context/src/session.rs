//! Per-conversation state and the in-memory session store

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use docent_protocol::{ChatMessage, SessionId};

/// Mutable state of one conversation.
///
/// Invariants maintained by the manager:
/// - `last_summarized` only ever grows, and always stays below
///   `messages.len()`
/// - `summarized_context` is present iff `last_summarized` is present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Authoritative ordered message list, replaced by the caller each turn.
    pub messages: Vec<ChatMessage>,
    /// Cached result of the most recent full token-breakdown computation.
    /// Advisory only; never gates logic.
    pub total_tokens: usize,
    /// Highest pre-recent index already folded into `summarized_context`.
    pub last_summarized: Option<usize>,
    /// Accumulated compressed text covering messages up to and including
    /// `last_summarized`. Appended to on each compaction, never replaced.
    pub summarized_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        let now = Utc::now();
        Self {
            id,
            messages: Vec::new(),
            total_tokens: 0,
            last_summarized: None,
            summarized_context: None,
            created_at: now,
            last_active: now,
        }
    }

    pub fn has_summary(&self) -> bool {
        self.summarized_context.is_some()
    }

    pub(crate) fn touch(&mut self) {
        self.last_active = Utc::now();
    }
}

/// Observable aggregate state of a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub message_count: usize,
    pub total_tokens: usize,
    pub has_summary: bool,
    pub last_summarized_index: Option<usize>,
}

/// In-memory map from session id to session state.
///
/// Each entry is wrapped in its own `Mutex`; the manager holds that lock for
/// a whole turn, so interleaved turns for the same session cannot race on
/// summarization progress. No persistence, no automatic expiry - eviction is
/// the host's call via [`SessionStore::evict_idle`].
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the session for `id`, creating it lazily on first use.
    pub async fn get_or_create(&self, id: &SessionId) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock: another task may have created it.
        Arc::clone(
            sessions
                .entry(id.clone())
                .or_insert_with(|| {
                    debug!(session = %id, "creating session");
                    Arc::new(Mutex::new(Session::new(id.clone())))
                }),
        )
    }

    pub async fn get(&self, id: &SessionId) -> Option<Arc<Mutex<Session>>> {
        self.sessions.read().await.get(id).map(Arc::clone)
    }

    /// Remove the session entirely. Returns whether it existed.
    pub async fn clear(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Aggregate stats, or `None` for an unknown session.
    pub async fn stats(&self, id: &SessionId) -> Option<SessionStats> {
        let entry = self.get(id).await?;
        let session = entry.lock().await;
        Some(SessionStats {
            message_count: session.messages.len(),
            total_tokens: session.total_tokens,
            has_summary: session.has_summary(),
            last_summarized_index: session.last_summarized,
        })
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle for longer than `max_idle`. Returns the number
    /// evicted. Never called automatically; lifecycle stays with the host.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.sessions.write().await;
        let mut evicted = Vec::new();

        for (id, entry) in sessions.iter() {
            let session = entry.lock().await;
            if session.last_active < cutoff {
                evicted.push(id.clone());
            }
        }
        for id in &evicted {
            debug!(session = %id, "evicting idle session");
            sessions.remove(id);
        }
        evicted.len()
    }
}
