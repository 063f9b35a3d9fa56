use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::error::BridgeError;

/// Smallest history bound that still holds the 3-entry preamble plus one turn
pub const MIN_MAX_LENGTH: usize = 5;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub dialogue: DialogueConfig,
    pub classifier: ClassifierConfig,
    pub image: ImageConfig,
    pub transport: TransportConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8088,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Falls back to OPENAI_KEY when empty
    pub api_key: String,
    pub chat_model: String,
    pub timeout_seconds: u64,
    pub max_concurrency: usize,
    pub acquire_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            api_key: String::new(),
            chat_model: "gpt-3.5-turbo".to_string(),
            timeout_seconds: 60,
            max_concurrency: 8,
            acquire_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DialogueConfig {
    pub max_length: usize,
    pub system_prompt: String,
    pub example_user: String,
    pub example_assistant: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            max_length: 33,
            system_prompt: "you are a very helpful assistant".to_string(),
            example_user: "How can I plan my career development?".to_string(),
            example_assistant: DEFAULT_EXAMPLE_ASSISTANT.to_string(),
        }
    }
}

const DEFAULT_EXAMPLE_ASSISTANT: &str = "Planning your career development can be an important step towards achieving your professional goals. Here are some steps you can take to plan your career development:
1. Assess your current skills and strengths: Before you start planning your career development, it's important to have a good understanding of your current skills and strengths. This can help you identify areas where you need to improve and areas where you excel.
2. Identify your career goals: Think about what you want to achieve in your career. This can include short-term and long-term goals, such as learning a new skill, getting a promotion, or starting your own business.
2. Research career paths: Once you have identified your career goals, research different career paths that can help you achieve those goals. Look for job descriptions, career websites, and other resources to learn more about the skills and experience needed for different roles.";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierStrategy {
    #[default]
    Keyword,
    Model,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub strategy: ClassifierStrategy,
    pub keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::Keyword,
            keywords: vec!["生成图片".to_string(), "generate image".to_string()],
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageSize {
    #[default]
    #[serde(rename = "256x256")]
    Small,
    #[serde(rename = "512x512")]
    Medium,
    #[serde(rename = "1024x1024")]
    Large,
}

impl ImageSize {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Small => "256x256",
            Self::Medium => "512x512",
            Self::Large => "1024x1024",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ImageConfig {
    pub size: ImageSize,
    pub output_dir: PathBuf,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: ImageSize::Small,
            output_dir: PathBuf::from("./images/"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TransportConfig {
    /// Gateway endpoint replies are posted to
    pub reply_url: String,
    /// Sender id the gateway uses for the bot account
    pub bot_id: String,
    pub timeout_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reply_url: "http://127.0.0.1:8089/api/replies".to_string(),
            bot_id: String::new(),
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub app_id: String,
    pub api_key: String,
    pub request_signature: String,
    pub timestamp_tolerance: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_id: "chat-gateway".to_string(),
            api_key: String::new(),
            request_signature: "enabled".to_string(),
            timestamp_tolerance: 300,
        }
    }
}

impl SecurityConfig {
    pub fn signature_enabled(&self) -> bool {
        self.request_signature == "enabled"
    }
}

impl Settings {
    /// Load `config/settings.toml` (optional) overlaid with `APP__*` env vars
    pub fn load() -> Result<Self, BridgeError> {
        dotenvy::dotenv().ok();

        let config = Config::builder()
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("classifier.keywords"),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Parse settings from an in-memory TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self, BridgeError> {
        let config = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self, BridgeError> {
        let mut settings: Settings = config.try_deserialize()?;

        if settings.backend.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_KEY") {
                settings.backend.api_key = key;
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.dialogue.max_length < MIN_MAX_LENGTH {
            return Err(BridgeError::Configuration(format!(
                "dialogue.max_length must be at least {}, got {}",
                MIN_MAX_LENGTH, self.dialogue.max_length
            )));
        }

        if self.classifier.strategy == ClassifierStrategy::Keyword
            && self.classifier.keywords.iter().all(|k| k.trim().is_empty())
        {
            return Err(BridgeError::Configuration(
                "classifier.keywords must not be empty for the keyword strategy".to_string(),
            ));
        }

        if self.backend.timeout_seconds == 0 {
            return Err(BridgeError::Configuration(
                "backend.timeout_seconds must be greater than zero".to_string(),
            ));
        }

        // an empty key would accept an empty X-API-Key header
        if self.security.enabled && self.security.api_key.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "security.api_key must be set while webhook security is enabled".to_string(),
            ));
        }

        Ok(())
    }
}
