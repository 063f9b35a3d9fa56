pub mod error;
pub mod limiters;
pub mod logger;

pub use error::BridgeError;
pub use limiters::Limiters;
