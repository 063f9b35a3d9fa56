use std::sync::Arc;

use crate::config::DialogueConfig;
use crate::models::chat::ChatMessage;

/// Few-shot seed every new session starts with: one system message and one
/// example user/assistant exchange.
#[derive(Debug, Clone)]
pub struct Preamble {
    messages: Arc<[ChatMessage]>,
}

impl Preamble {
    pub fn new(system_prompt: &str, example_user: &str, example_assistant: &str) -> Self {
        Self {
            messages: Arc::from(vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(example_user),
                ChatMessage::assistant(example_assistant),
            ]),
        }
    }

    pub fn from_config(cfg: &DialogueConfig) -> Self {
        Self::new(&cfg.system_prompt, &cfg.example_user, &cfg.example_assistant)
    }

    /// Owned copy for a new session; the template itself is never handed out
    pub fn seed(&self) -> Vec<ChatMessage> {
        self.messages.to_vec()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl Default for Preamble {
    fn default() -> Self {
        Self::from_config(&DialogueConfig::default())
    }
}
