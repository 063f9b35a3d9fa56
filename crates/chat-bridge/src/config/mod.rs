pub mod settings;

pub use settings::{
    BackendConfig, ClassifierConfig, ClassifierStrategy, DialogueConfig, ImageConfig, ImageSize,
    SecurityConfig, ServerConfig, Settings, TransportConfig, MIN_MAX_LENGTH,
};
