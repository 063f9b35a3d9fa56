use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::handlers;
use crate::security;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    // Public routes (no security)
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    // Gateway webhook
    let protected_routes = Router::new()
        .route("/api/messages", post(handlers::messages::receive_message))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security::middleware::security_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}
