use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::TransportConfig;
use crate::models::chat::{InboundEnvelope, MessageKind, OutboundReply};
use crate::utils::error::BridgeError;

use super::InboundMessage;

/// Posts replies back to the chat gateway
#[derive(Clone)]
pub struct ReplyClient {
    client: Client,
    reply_url: String,
}

impl ReplyClient {
    pub fn new(cfg: &TransportConfig) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds.max(1)))
            .build()
            .map_err(|e| BridgeError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            reply_url: cfg.reply_url.clone(),
        })
    }

    pub async fn send(&self, reply: &OutboundReply) -> Result<(), BridgeError> {
        let response = self
            .client
            .post(&self.reply_url)
            .json(reply)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(format!("Failed to reach gateway: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Transport(format!(
                "Gateway rejected reply: {} - {}",
                status, body
            )));
        }

        Ok(())
    }
}

/// Gateway webhook payload bound to the client that answers it
pub struct WebhookMessage {
    envelope: InboundEnvelope,
    bot_id: String,
    replier: Arc<ReplyClient>,
}

impl WebhookMessage {
    pub fn new(envelope: InboundEnvelope, bot_id: impl Into<String>, replier: Arc<ReplyClient>) -> Self {
        Self {
            envelope,
            bot_id: bot_id.into(),
            replier,
        }
    }
}

#[async_trait]
impl InboundMessage for WebhookMessage {
    fn is_from_group(&self) -> bool {
        self.envelope.from_group
    }

    fn is_mentioned(&self) -> bool {
        self.envelope.mentioned
    }

    fn is_from_known_contact(&self) -> bool {
        self.envelope.known_contact
    }

    fn is_from_self(&self) -> bool {
        self.envelope.from_self
            || (!self.bot_id.is_empty() && self.envelope.sender_id == self.bot_id)
    }

    fn is_text(&self) -> bool {
        self.envelope.kind == MessageKind::Text
    }

    fn sender_id(&self) -> String {
        self.envelope.sender_id.clone()
    }

    fn content(&self) -> String {
        self.envelope.content.clone()
    }

    async fn reply_text(&self, text: &str) -> Result<(), BridgeError> {
        debug!("Replying text to chat {}", self.envelope.chat_id);
        self.replier
            .send(&OutboundReply::Text {
                chat_id: self.envelope.chat_id.clone(),
                reply_to: self.envelope.message_id.clone(),
                text: text.to_string(),
            })
            .await
    }

    async fn reply_image(&self, path: &Path) -> Result<(), BridgeError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        debug!(
            "Replying image {} ({} bytes) to chat {}",
            file_name,
            bytes.len(),
            self.envelope.chat_id
        );

        self.replier
            .send(&OutboundReply::Image {
                chat_id: self.envelope.chat_id.clone(),
                reply_to: self.envelope.message_id.clone(),
                file_name,
                image_base64: STANDARD.encode(&bytes),
            })
            .await
    }
}
