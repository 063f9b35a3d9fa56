use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;

use crate::security::CustomHeaderValidator;
use crate::utils::error::BridgeError;

/// Rejects webhook calls that fail gateway header validation
pub async fn security_middleware(
    State(validator): State<Arc<CustomHeaderValidator>>,
    request: Request,
    next: Next,
) -> Result<Response, BridgeError> {
    if !validator.is_enabled() {
        return Ok(next.run(request).await);
    }

    let validated = validator.validate(request.headers())?;
    debug!(
        "Request validated: app_id={}, timestamp={}",
        validated.app_id, validated.timestamp
    );

    Ok(next.run(request).await)
}
