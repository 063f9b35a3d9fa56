pub mod chat;

pub use chat::{ChatMessage, InboundEnvelope, MessageKind, OutboundReply, Role, UserId};
