//! Intent classifier
//! Decides whether an incoming chat message asks for an image
//! or should be answered conversationally.

use std::sync::Arc;
use tracing::debug;

use crate::config::{ClassifierConfig, ClassifierStrategy};
use crate::models::chat::ChatMessage;
use crate::services::llm_service::CompletionBackend;
use crate::utils::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentDecision {
    /// Route to image generation
    /// Examples: "generate image of a cat", "生成图片 一只猫"
    ImageRequest,

    /// Everything else goes through the conversation
    Conversational,
}

impl From<bool> for IntentDecision {
    fn from(is_image: bool) -> Self {
        if is_image {
            Self::ImageRequest
        } else {
            Self::Conversational
        }
    }
}

/// Tokens the model strategy accepts as "yes"; anything else is "no"
const AFFIRMATIVE_TOKENS: [&str; 2] = ["yes", "是"];

const MODEL_CLASSIFIER_INSTRUCTION: &str = "You classify chat messages. \
Decide whether the user is asking you to generate, draw or create an image or picture. \
Answer with exactly one word: \"yes\" or \"no\". No punctuation, no explanation.";

/// Substring match against configured trigger phrases
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    triggers: Vec<String>,
}

impl KeywordClassifier {
    pub fn new<I, S>(triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            triggers: triggers
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn is_image_request(&self, text: &str) -> bool {
        let text_lower = text.to_lowercase();

        for trigger in &self.triggers {
            if text_lower.contains(trigger.as_str()) {
                debug!("Detected image request: matched '{}'", trigger);
                return true;
            }
        }

        false
    }
}

/// Single-shot yes/no classification by the completion backend
#[derive(Clone)]
pub struct ModelClassifier {
    backend: Arc<dyn CompletionBackend>,
}

impl ModelClassifier {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    fn prompt(text: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(MODEL_CLASSIFIER_INSTRUCTION),
            ChatMessage::user("generate image of a sunset over the sea"),
            ChatMessage::assistant("yes"),
            ChatMessage::user("How can I plan my career development?"),
            ChatMessage::assistant("no"),
            ChatMessage::user("帮我画一只猫"),
            ChatMessage::assistant("yes"),
            ChatMessage::user(text),
        ]
    }

    /// Exact token match after trimming. Ambiguous answers are "no".
    pub fn interpret(response: &str) -> bool {
        let answer = response.trim();
        AFFIRMATIVE_TOKENS.contains(&answer)
    }

    pub async fn is_image_request(&self, text: &str) -> Result<bool, BridgeError> {
        let response = self.backend.complete(&Self::prompt(text)).await?;
        let is_image = Self::interpret(&response);

        debug!("Model classifier answered {:?} -> image={}", response.trim(), is_image);
        Ok(is_image)
    }
}

/// Image-request detection, strategy chosen by configuration
#[derive(Clone)]
pub enum IntentClassifier {
    Keyword(KeywordClassifier),
    Model(ModelClassifier),
}

impl IntentClassifier {
    pub fn from_config(cfg: &ClassifierConfig, backend: Arc<dyn CompletionBackend>) -> Self {
        match cfg.strategy {
            ClassifierStrategy::Keyword => Self::Keyword(KeywordClassifier::new(&cfg.keywords)),
            ClassifierStrategy::Model => Self::Model(ModelClassifier::new(backend)),
        }
    }

    pub fn strategy(&self) -> ClassifierStrategy {
        match self {
            Self::Keyword(_) => ClassifierStrategy::Keyword,
            Self::Model(_) => ClassifierStrategy::Model,
        }
    }

    /// Keyword matching never fails; the model strategy propagates backend errors
    pub async fn is_image_request(&self, text: &str) -> Result<bool, BridgeError> {
        match self {
            Self::Keyword(classifier) => Ok(classifier.is_image_request(text)),
            Self::Model(classifier) => classifier.is_image_request(text).await,
        }
    }

    pub async fn classify(&self, text: &str) -> Result<IntentDecision, BridgeError> {
        self.is_image_request(text).await.map(IntentDecision::from)
    }
}
