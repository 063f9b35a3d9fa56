use tracing::debug;

use crate::config::MIN_MAX_LENGTH;
use crate::models::chat::ChatMessage;
use crate::utils::error::BridgeError;

use super::types::ConversationSession;

/// Appends turns to a session and keeps it within `max_length`
#[derive(Debug, Clone)]
pub struct DialogueManager {
    max_length: usize,
}

impl DialogueManager {
    pub fn new(max_length: usize) -> Result<Self, BridgeError> {
        if max_length < MIN_MAX_LENGTH {
            return Err(BridgeError::Configuration(format!(
                "max_length must be at least {} (preamble + one turn), got {}",
                MIN_MAX_LENGTH, max_length
            )));
        }
        Ok(Self { max_length })
    }

    /// Append the user's message and return the full context to submit.
    ///
    /// When the session already holds `max_length` entries the oldest turn
    /// (one user + one assistant message) is dropped first. The leading
    /// system message stays in place.
    pub fn append_user_turn(&self, session: &mut ConversationSession, text: &str) -> Vec<ChatMessage> {
        if session.messages.len() >= self.max_length {
            let evicted = Self::evict_oldest_turn(session);
            debug!(
                "Evicted {} entries from session {} (len now {})",
                evicted,
                session.user_id,
                session.messages.len()
            );
        }

        session.messages.push(ChatMessage::user(text));
        session.touch();
        session.messages.clone()
    }

    /// Record the generation result as the assistant half of the turn.
    ///
    /// No bound check happens here: with an even `max_length` the session can
    /// sit one entry above the bound until the next user turn trims it.
    pub fn append_assistant_turn(&self, session: &mut ConversationSession, text: &str) {
        session.messages.push(ChatMessage::assistant(text));
        session.metadata.total_turns += 1;
        session.touch();
    }

    /// Removes exactly two entries right after the pinned system prefix.
    /// Returns the number removed (0 if there is no full turn to drop).
    fn evict_oldest_turn(session: &mut ConversationSession) -> usize {
        let start = session.pinned_len();
        if session.messages.len() < start + 2 {
            return 0;
        }

        session.messages.drain(start..start + 2);
        session.metadata.evictions += 1;
        2
    }
}
