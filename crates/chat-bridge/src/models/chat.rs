use serde::{Deserialize, Serialize};

/// Identifier of the chat participant a conversation belongs to
pub type UserId = String;

// ===== DIALOGUE MODELS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One entry of a conversation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

// ===== INBOUND (GATEWAY -> BRIDGE) =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    #[serde(other)]
    Other,
}

/// Message as delivered by the chat gateway webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEnvelope {
    pub message_id: String,
    pub sender_id: String,
    /// Conversation the reply goes back to (group or direct chat)
    pub chat_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub from_group: bool,
    #[serde(default)]
    pub mentioned: bool,
    #[serde(default)]
    pub known_contact: bool,
    #[serde(default)]
    pub from_self: bool,
}

#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub message_id: String,
    pub status: String,
}

// ===== OUTBOUND (BRIDGE -> GATEWAY) =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundReply {
    Text {
        chat_id: String,
        reply_to: String,
        text: String,
    },
    Image {
        chat_id: String,
        reply_to: String,
        file_name: String,
        image_base64: String,
    },
}
