//! Conversation memory
//!
//! In-memory, per-user dialogue state:
//! - Sharded session map with a lock per user (`SessionStore`)
//! - Few-shot seed for new sessions (`Preamble`)
//! - Bounded append/evict policy (`DialogueManager`)

mod cache;
mod dialogue;
mod preamble;
pub mod types;

pub use cache::{SessionGuard, SessionStore};
pub use dialogue::DialogueManager;
pub use preamble::Preamble;
pub use types::{ConversationSession, SessionMetadata};
