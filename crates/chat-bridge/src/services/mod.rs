pub mod conversation;
pub mod image_sink;
pub mod intent_classifier;
pub mod llm_service;
pub mod router;

pub use conversation::{DialogueManager, Preamble, SessionStore};
pub use image_sink::ImageSink;
pub use intent_classifier::{IntentClassifier, IntentDecision};
pub use llm_service::{CompletionBackend, ImageBackend, OpenAiClient};
pub use router::{MessageRouter, RouteOutcome};
