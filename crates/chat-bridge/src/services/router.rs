//! Per-message routing
//! Filters incoming chat messages, picks image generation or conversation,
//! and sends the answer back through the transport.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{ClassifierStrategy, ImageSize, Settings};
use crate::services::conversation::{DialogueManager, SessionStore};
use crate::services::image_sink::ImageSink;
use crate::services::intent_classifier::{IntentClassifier, IntentDecision};
use crate::services::llm_service::{CompletionBackend, ImageBackend};
use crate::transport::InboundMessage;
use crate::utils::error::BridgeError;
use crate::utils::limiters::Limiters;

/// Why a message was dropped without a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Group message that does not mention the bot, or direct message from a stranger
    NotAddressed,
    SelfMessage,
    NonText,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Rejected(Rejection),
    ImageSent(PathBuf),
    TextSent,
}

pub struct MessageRouter {
    sessions: SessionStore,
    dialogue: DialogueManager,
    classifier: IntentClassifier,
    completion: Arc<dyn CompletionBackend>,
    images: Arc<dyn ImageBackend>,
    image_sink: ImageSink,
    image_size: ImageSize,
    limiters: Limiters,
    backend_timeout: Duration,
}

impl MessageRouter {
    pub fn from_settings(
        settings: &Settings,
        sessions: SessionStore,
        completion: Arc<dyn CompletionBackend>,
        images: Arc<dyn ImageBackend>,
    ) -> Result<Self, BridgeError> {
        Ok(Self {
            dialogue: DialogueManager::new(settings.dialogue.max_length)?,
            classifier: IntentClassifier::from_config(&settings.classifier, completion.clone()),
            image_sink: ImageSink::new(settings.image.output_dir.clone()),
            image_size: settings.image.size,
            limiters: Limiters::new(&settings.backend),
            backend_timeout: Duration::from_secs(settings.backend.timeout_seconds),
            sessions,
            completion,
            images,
        })
    }

    pub fn with_backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Entry point for the transport. Failures are logged and the user gets no reply.
    pub async fn handle_incoming(&self, message: &dyn InboundMessage) {
        match self.route(message).await {
            Ok(RouteOutcome::Rejected(reason)) => {
                debug!("Ignored message from {}: {:?}", message.sender_id(), reason);
            }
            Ok(RouteOutcome::ImageSent(path)) => {
                info!("Sent image {} to {}", path.display(), message.sender_id());
            }
            Ok(RouteOutcome::TextSent) => {
                debug!("Sent text reply to {}", message.sender_id());
            }
            Err(e) => {
                error!(
                    sender = %message.sender_id(),
                    kind = e.kind(),
                    retryable = e.is_retryable(),
                    "Message dropped: {}",
                    e
                );
            }
        }
    }

    pub async fn route(&self, message: &dyn InboundMessage) -> Result<RouteOutcome, BridgeError> {
        if let Some(reason) = Self::screen(message) {
            return Ok(RouteOutcome::Rejected(reason));
        }

        let text = message.content();

        let decision = match self.classify(&text).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    "Classification failed for {}, answering conversationally: {}",
                    message.sender_id(),
                    e
                );
                IntentDecision::Conversational
            }
        };

        match decision {
            IntentDecision::ImageRequest => self.answer_with_image(message, &text).await,
            IntentDecision::Conversational => self.answer_with_text(message, &text).await,
        }
    }

    /// Eligibility, self-echo and type filters, in that order
    fn screen(message: &dyn InboundMessage) -> Option<Rejection> {
        let addressed = if message.is_from_group() {
            message.is_mentioned()
        } else {
            message.is_from_known_contact()
        };

        if !addressed {
            Some(Rejection::NotAddressed)
        } else if message.is_from_self() {
            Some(Rejection::SelfMessage)
        } else if !message.is_text() {
            Some(Rejection::NonText)
        } else {
            None
        }
    }

    async fn classify(&self, text: &str) -> Result<IntentDecision, BridgeError> {
        match self.classifier.strategy() {
            ClassifierStrategy::Keyword => self.classifier.classify(text).await,
            ClassifierStrategy::Model => {
                self.call_backend("classify", self.classifier.classify(text))
                    .await
            }
        }
    }

    /// Image requests never touch the conversation history
    async fn answer_with_image(
        &self,
        message: &dyn InboundMessage,
        prompt: &str,
    ) -> Result<RouteOutcome, BridgeError> {
        let bytes = self
            .call_backend(
                "generate_image",
                self.images.generate_image(prompt, self.image_size),
            )
            .await?;

        let path = self.image_sink.persist(&bytes).await?;
        message.reply_image(&path).await?;

        Ok(RouteOutcome::ImageSent(path))
    }

    /// One conversational turn under the sender's session lock.
    ///
    /// The stored session is only replaced after the completion and the reply
    /// both succeed; any failure leaves it as it was.
    async fn answer_with_text(
        &self,
        message: &dyn InboundMessage,
        text: &str,
    ) -> Result<RouteOutcome, BridgeError> {
        let user_id = message.sender_id();
        let mut guard = self.sessions.lock(&user_id).await;
        let mut working = (*guard).clone();

        let context = self.dialogue.append_user_turn(&mut working, text);
        let reply = self
            .call_backend("complete", self.completion.complete(&context))
            .await?;

        message.reply_text(&reply).await?;

        self.dialogue.append_assistant_turn(&mut working, &reply);
        guard.replace(working);

        Ok(RouteOutcome::TextSent)
    }

    /// Bounded backend call: waits for a limiter permit, then for the call itself
    async fn call_backend<T, F>(&self, op: &'static str, call: F) -> Result<T, BridgeError>
    where
        F: Future<Output = Result<T, BridgeError>>,
    {
        let (_permit, waited) = self.limiters.acquire_backend(op).await?;
        if waited > Duration::from_millis(100) {
            debug!("Waited {:?} for backend permit (op={})", waited, op);
        }

        tokio::time::timeout(self.backend_timeout, call)
            .await
            .map_err(|_| {
                BridgeError::BackendTimeout(format!(
                    "{} did not finish within {:?}",
                    op, self.backend_timeout
                ))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use crate::models::chat::ChatMessage;
    use crate::services::conversation::Preamble;
    use crate::services::llm_service::{MockCompletionBackend, MockImageBackend};
    use crate::transport::MockInboundMessage;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::path::Path;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    struct Flags {
        group: bool,
        mentioned: bool,
        known: bool,
        from_self: bool,
        text: bool,
    }

    const DIRECT_FROM_CONTACT: Flags = Flags {
        group: false,
        mentioned: false,
        known: true,
        from_self: false,
        text: true,
    };

    fn message(flags: Flags, content: impl Into<String>) -> MockInboundMessage {
        let content = content.into();
        let mut msg = MockInboundMessage::new();
        msg.expect_is_from_group().return_const(flags.group);
        msg.expect_is_mentioned().return_const(flags.mentioned);
        msg.expect_is_from_known_contact().return_const(flags.known);
        msg.expect_is_from_self().return_const(flags.from_self);
        msg.expect_is_text().return_const(flags.text);
        msg.expect_sender_id().returning(|| "alice".to_string());
        msg.expect_content().returning(move || content.clone());
        msg
    }

    fn settings(output_dir: &Path) -> Settings {
        let mut settings = Settings::default();
        settings.image.output_dir = output_dir.to_path_buf();
        settings
    }

    fn store() -> SessionStore {
        SessionStore::new(Preamble::new("sys", "example q", "example a"))
    }

    fn router(
        settings: &Settings,
        sessions: SessionStore,
        completion: MockCompletionBackend,
        images: MockImageBackend,
    ) -> MessageRouter {
        MessageRouter::from_settings(settings, sessions, Arc::new(completion), Arc::new(images))
            .unwrap()
    }

    fn silent_backends() -> (MockCompletionBackend, MockImageBackend) {
        let mut completion = MockCompletionBackend::new();
        completion.expect_complete().times(0);
        let mut images = MockImageBackend::new();
        images.expect_generate_image().times(0);
        (completion, images)
    }

    async fn assert_ignored(flags: Flags, reason: Rejection) {
        let dir = tempfile::tempdir().unwrap();
        let (completion, images) = silent_backends();
        let router = router(&settings(dir.path()), store(), completion, images);

        let mut msg = message(flags, "hello");
        msg.expect_reply_text().times(0);
        msg.expect_reply_image().times(0);

        let outcome = router.route(&msg).await.unwrap();
        assert_eq!(outcome, RouteOutcome::Rejected(reason));
        assert!(router.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_group_message_without_mention_is_ignored() {
        let flags = Flags { group: true, mentioned: false, known: true, from_self: false, text: true };
        assert_ignored(flags, Rejection::NotAddressed).await;
    }

    #[tokio::test]
    async fn test_direct_message_from_unknown_sender_is_ignored() {
        let flags = Flags { known: false, ..DIRECT_FROM_CONTACT };
        assert_ignored(flags, Rejection::NotAddressed).await;
    }

    #[tokio::test]
    async fn test_self_message_is_ignored() {
        let flags = Flags { from_self: true, ..DIRECT_FROM_CONTACT };
        assert_ignored(flags, Rejection::SelfMessage).await;
    }

    #[tokio::test]
    async fn test_non_text_message_is_ignored() {
        let flags = Flags { text: false, ..DIRECT_FROM_CONTACT };
        assert_ignored(flags, Rejection::NonText).await;
    }

    #[tokio::test]
    async fn test_hello_round_trip_records_turn() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = store();

        let mut expected_context = Preamble::new("sys", "example q", "example a").seed();
        expected_context.push(ChatMessage::user("hello"));

        let mut completion = MockCompletionBackend::new();
        completion
            .expect_complete()
            .withf(move |messages: &[ChatMessage]| messages == expected_context.as_slice())
            .times(1)
            .returning(|_| Ok("Hi! How can I help?".to_string()));
        let mut images = MockImageBackend::new();
        images.expect_generate_image().times(0);

        let mut msg = message(DIRECT_FROM_CONTACT, "hello");
        msg.expect_reply_text()
            .withf(|text: &str| text == "Hi! How can I help?")
            .times(1)
            .returning(|_| Ok(()));

        let router = router(&settings(dir.path()), sessions.clone(), completion, images);
        router.handle_incoming(&msg).await;

        let session = sessions.snapshot("alice").await.unwrap();
        let contents: Vec<&str> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["sys", "example q", "example a", "hello", "Hi! How can I help?"]
        );
        assert_eq!(session.metadata.total_turns, 1);
    }

    #[tokio::test]
    async fn test_group_mention_is_answered() {
        let dir = tempfile::tempdir().unwrap();
        let mut completion = MockCompletionBackend::new();
        completion
            .expect_complete()
            .times(1)
            .returning(|_| Ok("sure".to_string()));
        let (_, images) = silent_backends();

        let flags = Flags { group: true, mentioned: true, known: false, from_self: false, text: true };
        let mut msg = message(flags, "@bot hi");
        msg.expect_reply_text().times(1).returning(|_| Ok(()));

        let router = router(&settings(dir.path()), store(), completion, images);
        assert_eq!(router.route(&msg).await.unwrap(), RouteOutcome::TextSent);
    }

    #[tokio::test]
    async fn test_backend_failure_leaves_session_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = store();
        let before = sessions.get_or_create("alice").await;

        let mut completion = MockCompletionBackend::new();
        completion
            .expect_complete()
            .returning(|_| Err(BridgeError::Backend("500".to_string())));
        let (_, images) = silent_backends();

        let mut msg = message(DIRECT_FROM_CONTACT, "hello");
        msg.expect_reply_text().times(0);

        let router = router(&settings(dir.path()), sessions.clone(), completion, images);
        let err = router.route(&msg).await.unwrap_err();
        assert!(matches!(err, BridgeError::Backend(_)));

        // handle_incoming swallows the same failure
        router.handle_incoming(&msg).await;

        assert_eq!(sessions.snapshot("alice").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_failed_reply_does_not_commit_turn() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = store();

        let mut completion = MockCompletionBackend::new();
        completion.expect_complete().returning(|_| Ok("answer".to_string()));
        let (_, images) = silent_backends();

        let mut msg = message(DIRECT_FROM_CONTACT, "hello");
        msg.expect_reply_text()
            .returning(|_| Err(BridgeError::Transport("gateway down".to_string())));

        let router = router(&settings(dir.path()), sessions.clone(), completion, images);
        let err = router.route(&msg).await.unwrap_err();

        assert!(matches!(err, BridgeError::Transport(_)));
        assert_eq!(sessions.snapshot("alice").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_image_request_sends_file_without_recording() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = store();

        let mut completion = MockCompletionBackend::new();
        completion.expect_complete().times(0);
        let mut images = MockImageBackend::new();
        images
            .expect_generate_image()
            .withf(|prompt: &str, size: &ImageSize| {
                prompt == "please generate image of a cat" && *size == ImageSize::Small
            })
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(PNG)));

        let mut msg = message(DIRECT_FROM_CONTACT, "please generate image of a cat");
        msg.expect_reply_text().times(0);
        msg.expect_reply_image()
            .withf(|path: &Path| path.exists() && path.extension().is_some_and(|e| e == "png"))
            .times(1)
            .returning(|_| Ok(()));

        let router = router(&settings(dir.path()), sessions.clone(), completion, images);
        let outcome = router.route(&msg).await.unwrap();

        assert!(matches!(outcome, RouteOutcome::ImageSent(ref p) if p.starts_with(dir.path())));
        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_image_is_not_sent() {
        let dir = tempfile::tempdir().unwrap();
        let (completion, _) = silent_backends();
        let mut images = MockImageBackend::new();
        images
            .expect_generate_image()
            .returning(|_, _| Ok(Bytes::from_static(b"<html>error</html>")));

        let mut msg = message(DIRECT_FROM_CONTACT, "generate image of a dog");
        msg.expect_reply_image().times(0);

        let router = router(&settings(dir.path()), store(), completion, images);
        let err = router.route(&msg).await.unwrap_err();
        assert!(matches!(err, BridgeError::ImageDecode(_)));
    }

    #[tokio::test]
    async fn test_classifier_failure_falls_back_to_conversation() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = settings(dir.path());
        settings.classifier = ClassifierConfig {
            strategy: ClassifierStrategy::Model,
            ..ClassifierConfig::default()
        };

        let mut completion = MockCompletionBackend::new();
        // classification prompt
        completion
            .expect_complete()
            .withf(|messages: &[ChatMessage]| messages[0].content != "sys")
            .times(1)
            .returning(|_| Err(BridgeError::Backend("classifier down".to_string())));
        // conversational context
        completion
            .expect_complete()
            .withf(|messages: &[ChatMessage]| messages[0].content == "sys")
            .times(1)
            .returning(|_| Ok("still here".to_string()));
        let (_, images) = silent_backends();

        let mut msg = message(DIRECT_FROM_CONTACT, "generate image of a cat");
        msg.expect_reply_text()
            .withf(|text: &str| text == "still here")
            .times(1)
            .returning(|_| Ok(()));

        let router = router(&settings, store(), completion, images);
        assert_eq!(router.route(&msg).await.unwrap(), RouteOutcome::TextSent);
    }

    struct StalledBackend;

    #[async_trait]
    impl CompletionBackend for StalledBackend {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, BridgeError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_stalled_backend_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let sessions = store();
        let (_, images) = silent_backends();

        let router = MessageRouter::from_settings(
            &settings(dir.path()),
            sessions.clone(),
            Arc::new(StalledBackend),
            Arc::new(images),
        )
        .unwrap()
        .with_backend_timeout(Duration::from_millis(50));

        let mut msg = message(DIRECT_FROM_CONTACT, "hello");
        msg.expect_reply_text().times(0);

        let err = router.route(&msg).await.unwrap_err();

        assert!(matches!(err, BridgeError::BackendTimeout(_)));
        assert!(err.is_retryable());
        assert_eq!(sessions.snapshot("alice").await.unwrap().len(), 3);
    }

    /// Answers "q<n>" with "a<n>" after yielding, so concurrent turns overlap
    struct EchoBackend;

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, BridgeError> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let question = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(question.replacen('q', "a", 1))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_turns_for_one_user_serialize() {
        const TURNS: usize = 8;
        let dir = tempfile::tempdir().unwrap();
        let sessions = store();
        let (_, images) = silent_backends();

        let router = Arc::new(
            MessageRouter::from_settings(
                &settings(dir.path()),
                sessions.clone(),
                Arc::new(EchoBackend),
                Arc::new(images),
            )
            .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..TURNS {
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                let mut msg = message(DIRECT_FROM_CONTACT, format!("q{}", i));
                msg.expect_reply_text().times(1).returning(|_| Ok(()));
                router.route(&msg).await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), RouteOutcome::TextSent);
        }

        let session = sessions.snapshot("alice").await.unwrap();
        assert_eq!(session.len(), 3 + TURNS * 2);
        assert_eq!(session.metadata.total_turns, TURNS);

        let mut seen = Vec::new();
        for pair in session.messages()[3..].chunks(2) {
            assert_eq!(pair[0].role, crate::models::chat::Role::User);
            let n = pair[0].content.trim_start_matches('q');
            assert_eq!(pair[1].content, format!("a{}", n));
            seen.push(n.parse::<usize>().unwrap());
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..TURNS).collect::<Vec<_>>());
    }

    #[test]
    fn test_invalid_max_length_is_rejected_at_construction() {
        let mut settings = Settings::default();
        settings.dialogue.max_length = 3;
        let (completion, images) = silent_backends();

        let result =
            MessageRouter::from_settings(&settings, store(), Arc::new(completion), Arc::new(images));
        assert!(matches!(result, Err(BridgeError::Configuration(_))));
    }
}
