//! Chat transport seam.
//!
//! The router only sees [`InboundMessage`]: who sent it, where it came
//! from, and how to answer. The webhook adapter is the gateway-backed
//! implementation.

pub mod webhook;

use async_trait::async_trait;
use std::path::Path;

use crate::utils::error::BridgeError;

pub use webhook::{ReplyClient, WebhookMessage};

/// One incoming chat message plus the ability to reply in the same conversation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InboundMessage: Send + Sync {
    fn is_from_group(&self) -> bool;

    /// True when the bot account was @-mentioned in a group message
    fn is_mentioned(&self) -> bool;

    fn is_from_known_contact(&self) -> bool;

    /// Sent by the bot account itself
    fn is_from_self(&self) -> bool;

    fn is_text(&self) -> bool;

    fn sender_id(&self) -> String;

    fn content(&self) -> String;

    async fn reply_text(&self, text: &str) -> Result<(), BridgeError>;

    /// Send a locally stored image file as the reply
    async fn reply_image(&self, path: &Path) -> Result<(), BridgeError>;
}
