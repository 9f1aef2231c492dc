use axum::{extract::State, http::HeaderMap, response::Json, routing::post, Router};
use bytes::Bytes;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{errors::ServiceError, services::WebhookOutcome, AppState};

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}

/// POST /api/v1/payments/webhook
///
/// Takes the raw body: the signature covers the exact bytes the provider sent.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let order_id = match state
        .services
        .payments
        .handle_webhook(&body, signature)
        .await?
    {
        WebhookOutcome::Settled(outcome) => {
            info!(order_id = %outcome.order.order.id, created = outcome.created, "Webhook settled");
            Some(outcome.order.order.id)
        }
        WebhookOutcome::Ignored { .. } => None,
    };

    Ok(Json(WebhookAck {
        received: true,
        order_id,
    }))
}
