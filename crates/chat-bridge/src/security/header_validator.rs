use axum::http::HeaderMap;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::config::SecurityConfig;
use crate::utils::error::BridgeError;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_APP_ID: &str = "X-App-ID";
pub const HEADER_API_KEY: &str = "X-API-Key";
pub const HEADER_TIMESTAMP: &str = "X-Request-Timestamp";
pub const HEADER_SIGNATURE: &str = "X-Request-Signature";

/// Authenticates webhook calls from the chat gateway
#[derive(Debug, Clone)]
pub struct CustomHeaderValidator {
    enabled: bool,
    expected_app_id: String,
    expected_api_key: String,
    signature_enabled: bool,
    timestamp_tolerance: i64, // seconds
}

impl CustomHeaderValidator {
    pub fn new(
        app_id: String,
        api_key: String,
        signature_enabled: bool,
        timestamp_tolerance: i64,
    ) -> Self {
        Self {
            enabled: true,
            expected_app_id: app_id,
            expected_api_key: api_key,
            signature_enabled,
            timestamp_tolerance,
        }
    }

    pub fn from_config(cfg: &SecurityConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            ..Self::new(
                cfg.app_id.clone(),
                cfg.api_key.clone(),
                cfg.signature_enabled(),
                cfg.timestamp_tolerance,
            )
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, BridgeError> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| BridgeError::Unauthorized(format!("Missing {} header", name)))
    }

    pub fn validate(&self, headers: &HeaderMap) -> Result<ValidatedRequest, BridgeError> {
        let app_id = Self::header(headers, HEADER_APP_ID)?;
        if app_id != self.expected_app_id {
            warn!("Invalid {}: expected {}, got {}", HEADER_APP_ID, self.expected_app_id, app_id);
            return Err(BridgeError::Unauthorized(format!("Invalid {}", HEADER_APP_ID)));
        }

        let api_key = Self::header(headers, HEADER_API_KEY)?;
        if api_key != self.expected_api_key {
            warn!("Invalid {}", HEADER_API_KEY);
            return Err(BridgeError::Unauthorized(format!("Invalid {}", HEADER_API_KEY)));
        }

        // Replay window
        let timestamp = Self::header(headers, HEADER_TIMESTAMP)?
            .parse::<i64>()
            .map_err(|_| BridgeError::Unauthorized(format!("Invalid {} header", HEADER_TIMESTAMP)))?;

        // abs_diff: the header is caller-controlled and may sit at the i64 extremes
        let diff = Utc::now().timestamp().abs_diff(timestamp);
        if diff > self.timestamp_tolerance.max(0).unsigned_abs() {
            warn!("Timestamp outside tolerance: {} seconds difference", diff);
            return Err(BridgeError::Unauthorized(
                "Request timestamp out of tolerance window".to_string(),
            ));
        }

        if self.signature_enabled {
            let signature = Self::header(headers, HEADER_SIGNATURE)?;
            self.verify_signature(app_id, timestamp, signature)?;
        }

        debug!("Gateway headers validated");

        Ok(ValidatedRequest {
            app_id: app_id.to_string(),
            timestamp,
        })
    }

    fn mac(&self, app_id: &str, timestamp: i64) -> Result<HmacSha256, BridgeError> {
        let mut mac = HmacSha256::new_from_slice(self.expected_api_key.as_bytes())
            .map_err(|e| BridgeError::Configuration(format!("HMAC error: {}", e)))?;
        mac.update(format!("{}{}", app_id, timestamp).as_bytes());
        Ok(mac)
    }

    /// HMAC-SHA256(api_key, app_id + timestamp), hex encoded
    fn verify_signature(&self, app_id: &str, timestamp: i64, signature: &str) -> Result<(), BridgeError> {
        let provided = hex::decode(signature)
            .map_err(|_| BridgeError::Unauthorized("Malformed signature".to_string()))?;

        self.mac(app_id, timestamp)?.verify_slice(&provided).map_err(|_| {
            warn!("Invalid request signature");
            BridgeError::Unauthorized("Invalid signature".to_string())
        })
    }

    /// Signature the gateway is expected to send
    pub fn generate_signature(&self, app_id: &str, timestamp: i64) -> Result<String, BridgeError> {
        Ok(hex::encode(self.mac(app_id, timestamp)?.finalize().into_bytes()))
    }
}

#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub app_id: String,
    pub timestamp: i64,
}
