use axum::{extract::State, http::StatusCode, Json};
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::models::chat::{AcceptedResponse, InboundEnvelope};
use crate::state::AppState;
use crate::transport::WebhookMessage;
use crate::utils::error::BridgeError;

/// Gateway webhook: accept the message and route it in the background
pub async fn receive_message(
    State(state): State<AppState>,
    Json(envelope): Json<InboundEnvelope>,
) -> Result<(StatusCode, Json<AcceptedResponse>), BridgeError> {
    if envelope.sender_id.trim().is_empty() || envelope.chat_id.trim().is_empty() {
        return Err(BridgeError::BadRequest(
            "sender_id and chat_id are required".to_string(),
        ));
    }

    let message_id = envelope.message_id.clone();
    let trace_id = Uuid::new_v4();
    debug!("Accepted message {} from {} (trace {})", message_id, envelope.sender_id, trace_id);

    let message = WebhookMessage::new(
        envelope,
        state.settings.transport.bot_id.clone(),
        state.reply_client.clone(),
    );
    let router = state.router.clone();
    let span = tracing::info_span!("message", id = %message_id, trace = %trace_id);

    tokio::spawn(
        async move {
            router.handle_incoming(&message).await;
        }
        .instrument(span),
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            message_id,
            status: "accepted".to_string(),
        }),
    ))
}
