use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::Settings;
use crate::security::CustomHeaderValidator;
use crate::services::{MessageRouter, SessionStore};
use crate::transport::ReplyClient;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub router: Arc<MessageRouter>,
    pub sessions: SessionStore,
    pub reply_client: Arc<ReplyClient>,
    pub header_validator: Arc<CustomHeaderValidator>,
}

impl FromRef<AppState> for Arc<MessageRouter> {
    fn from_ref(state: &AppState) -> Self {
        state.router.clone()
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<CustomHeaderValidator> {
    fn from_ref(state: &AppState) -> Self {
        state.header_validator.clone()
    }
}
