//! Per-session transcript state.
//!
//! Each session holds at most one transcript and the retrieval index derived
//! from it. Sessions live in memory only and are evicted once idle for longer
//! than the configured TTL.

use crate::rag::RetrievalIndex;
use crate::transcript::Transcript;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Session id used when a caller does not supply one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// State of one session.
pub struct Session {
    id: String,
    transcript: Option<Transcript>,
    index: Option<RetrievalIndex>,
    created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            transcript: None,
            index: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn transcript(&self) -> Option<&Transcript> {
        self.transcript.as_ref()
    }

    /// Store a new transcript, dropping the index of the previous one.
    pub fn replace_transcript(&mut self, transcript: Transcript) {
        debug!(session = %self.id, video = %transcript.video, "Replacing transcript");
        self.transcript = Some(transcript);
        self.index = None;
    }

    /// Cache an index if it was built from the stored transcript.
    ///
    /// Returns false and drops the index when it is for another transcript.
    pub fn set_index(&mut self, index: RetrievalIndex) -> bool {
        match &self.transcript {
            Some(t) if index.is_for(&t.content_hash) => {
                self.index = Some(index);
                true
            }
            _ => false,
        }
    }

    /// The cached index, if it matches the stored transcript.
    pub fn index(&self) -> Option<&RetrievalIndex> {
        let transcript = self.transcript.as_ref()?;
        self.index
            .as_ref()
            .filter(|index| index.is_for(&transcript.content_hash))
    }
}

struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_used: DateTime<Utc>,
}

/// All live sessions, keyed by session id.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionSlot>>,
    idle_ttl: chrono::Duration,
}

impl SessionStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl: chrono::Duration::from_std(idle_ttl).unwrap_or(chrono::Duration::MAX),
        }
    }

    /// Get a session, creating an empty one on first use.
    pub async fn get_or_create(&self, id: &str) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        self.evict_expired(&mut sessions, now);

        let slot = sessions.entry(id.to_string()).or_insert_with(|| {
            info!(session = %id, "Creating session");
            SessionSlot {
                session: Arc::new(Mutex::new(Session::new(id))),
                last_used: now,
            }
        });
        slot.last_used = now;
        slot.session.clone()
    }

    /// Get an existing session.
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<Session>>> {
        let mut sessions = self.sessions.write().await;
        let now = Utc::now();
        self.evict_expired(&mut sessions, now);

        let slot = sessions.get_mut(id)?;
        slot.last_used = now;
        Some(slot.session.clone())
    }

    /// Drop idle sessions now. Returns how many were removed.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        self.evict_expired(&mut sessions, Utc::now())
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    fn evict_expired(&self, sessions: &mut HashMap<String, SessionSlot>, now: DateTime<Utc>) -> usize {
        let before = sessions.len();
        // Sessions still referenced by a request are kept
        sessions.retain(|id, slot| {
            let keep = now - slot.last_used < self.idle_ttl || Arc::strong_count(&slot.session) > 1;
            if !keep {
                debug!(session = %id, "Evicting idle session");
            }
            keep
        });
        before - sessions.len()
    }
}
