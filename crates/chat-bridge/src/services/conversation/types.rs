use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::chat::{ChatMessage, Role, UserId};

/// Bounded, ordered conversation history of one user.
///
/// History is only mutated through `DialogueManager`; everything else reads
/// it through `messages()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// User who owns this conversation
    pub user_id: UserId,

    /// Preamble followed by user/assistant turns, oldest first
    pub(super) messages: Vec<ChatMessage>,

    pub created_at: DateTime<Utc>,

    pub last_activity: DateTime<Utc>,

    pub metadata: SessionMetadata,
}

impl ConversationSession {
    /// Create a session seeded with its own copy of the preamble
    pub fn new(user_id: impl Into<UserId>, preamble: Vec<ChatMessage>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            messages: preamble,
            created_at: now,
            last_activity: now,
            metadata: SessionMetadata::default(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Leading system messages that eviction never touches
    pub fn pinned_len(&self) -> usize {
        self.messages
            .iter()
            .take_while(|m| m.role == Role::System)
            .count()
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }
}

/// Counters kept for logging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Turns committed (user + assistant = 1)
    pub total_turns: usize,

    /// Times the oldest turn was dropped to respect the bound
    pub evictions: usize,
}
