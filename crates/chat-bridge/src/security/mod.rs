pub mod header_validator;
pub mod middleware;

pub use header_validator::CustomHeaderValidator;
pub use middleware::security_middleware;
