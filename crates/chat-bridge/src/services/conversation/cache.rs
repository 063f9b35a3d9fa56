use dashmap::DashMap;
use std::ops::Deref;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::models::chat::UserId;

use super::preamble::Preamble;
use super::types::ConversationSession;

type SessionSlot = Arc<Mutex<ConversationSession>>;

/// Per-user conversation storage.
///
/// The map is sharded (DashMap) and every user owns an async mutex, so
/// different users never wait on each other while two tasks for the same
/// user serialize their read-modify-write. Sessions live until the process
/// exits.
#[derive(Clone)]
pub struct SessionStore {
    storage: Arc<DashMap<UserId, SessionSlot>>,
    preamble: Preamble,
}

impl SessionStore {
    pub fn new(preamble: Preamble) -> Self {
        info!("Initializing session store (preamble: {} messages)", preamble.len());
        Self {
            storage: Arc::new(DashMap::new()),
            preamble,
        }
    }

    fn slot(&self, user_id: &str) -> SessionSlot {
        // Clone the Arc out so no shard lock is held across an await
        if let Some(entry) = self.storage.get(user_id) {
            return entry.value().clone();
        }

        self.storage
            .entry(user_id.to_string())
            .or_insert_with(|| {
                info!("Creating session for user {}", user_id);
                Arc::new(Mutex::new(ConversationSession::new(
                    user_id,
                    self.preamble.seed(),
                )))
            })
            .value()
            .clone()
    }

    /// Snapshot of the user's session, created from the preamble on first use
    pub async fn get_or_create(&self, user_id: &str) -> ConversationSession {
        self.slot(user_id).lock().await.clone()
    }

    /// Set the stored session for a user
    pub async fn replace(&self, user_id: &str, session: ConversationSession) {
        *self.slot(user_id).lock().await = session;
        debug!("Replaced session for user {}", user_id);
    }

    /// Exclusive access to one user's session for a whole turn.
    /// Other users are unaffected; later callers for this user wait.
    pub async fn lock(&self, user_id: &str) -> SessionGuard {
        let inner = self.slot(user_id).lock_owned().await;
        SessionGuard { inner }
    }

    /// Existing session only, without creating one
    pub async fn snapshot(&self, user_id: &str) -> Option<ConversationSession> {
        let slot = self.storage.get(user_id).map(|e| e.value().clone())?;
        let session = slot.lock().await.clone();
        Some(session)
    }

    /// Number of users with a session
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

/// Held lock on a single user's session
pub struct SessionGuard {
    inner: OwnedMutexGuard<ConversationSession>,
}

impl SessionGuard {
    pub fn replace(&mut self, session: ConversationSession) {
        *self.inner = session;
    }
}

impl Deref for SessionGuard {
    type Target = ConversationSession;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
