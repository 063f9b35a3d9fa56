use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::{BackendConfig, ImageSize};
use crate::models::chat::ChatMessage;
use crate::utils::error::BridgeError;

/// Chat completion over an ordered message list
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BridgeError>;
}

/// Text-to-image generation, returning the decoded image bytes
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageBackend: Send + Sync {
    async fn generate_image(&self, prompt: &str, size: ImageSize) -> Result<Bytes, BridgeError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    size: &'a str,
    n: u8,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    b64_json: Option<String>,
}

/// OpenAI-compatible HTTP client for both completions and images
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    config: BackendConfig,
}

impl OpenAiClient {
    pub fn new(config: BackendConfig) -> Result<Self, BridgeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| BridgeError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B: Serialize + ?Sized, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, BridgeError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BridgeError::BackendTimeout(format!("{}: {}", path, e))
                } else {
                    BridgeError::Backend(format!("Failed to call {}: {}", path, e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Backend(format!(
                "{} returned {} - {}",
                path, status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BridgeError::Backend(format!("Failed to parse {} response: {}", path, e)))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BridgeError> {
        debug!("Chat completion with {} messages", messages.len());

        let request = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages,
        };

        let response: ChatCompletionResponse =
            self.post_json("/v1/chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BridgeError::Backend("No choices returned from completion".to_string()))
    }
}

#[async_trait]
impl ImageBackend for OpenAiClient {
    async fn generate_image(&self, prompt: &str, size: ImageSize) -> Result<Bytes, BridgeError> {
        debug!("Image generation ({}) for prompt of {} chars", size.as_str(), prompt.chars().count());

        let request = ImageRequest {
            prompt,
            size: size.as_str(),
            n: 1,
            response_format: "b64_json",
        };

        let response: ImageResponse = self.post_json("/v1/images/generations", &request).await?;

        let encoded = response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| BridgeError::Backend("No image data returned".to_string()))?;

        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|e| BridgeError::ImageDecode(format!("Base64 decode error: {}", e)))?;

        Ok(Bytes::from(decoded))
    }
}
