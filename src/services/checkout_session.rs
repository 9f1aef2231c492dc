use super::{Buyer, CartSnapshotReader};
use crate::{
    config::AppConfig,
    dto::ShippingAddress,
    errors::ServiceError,
    events::{Event, EventSender},
    payments::{CheckoutSessionRequest, PaymentProvider},
};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// What the buyer is redirected to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReference {
    pub session_id: String,
    pub url: Option<String>,
}

/// Converts a decimal amount into minor currency units.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// Starts hosted checkout for a cart. Creates no order and stores nothing locally.
#[derive(Clone)]
pub struct CheckoutSessionInitiator {
    carts: CartSnapshotReader,
    provider: Arc<dyn PaymentProvider>,
    config: Arc<AppConfig>,
    event_sender: EventSender,
}

impl CheckoutSessionInitiator {
    pub fn new(
        carts: CartSnapshotReader,
        provider: Arc<dyn PaymentProvider>,
        config: Arc<AppConfig>,
        event_sender: EventSender,
    ) -> Self {
        Self {
            carts,
            provider,
            config,
            event_sender,
        }
    }

    #[instrument(skip(self, buyer, shipping_address), fields(buyer_id = %buyer.id))]
    pub async fn start(
        &self,
        cart_id: Uuid,
        buyer: &Buyer,
        shipping_address: &ShippingAddress,
    ) -> Result<SessionReference, ServiceError> {
        let snapshot = self.carts.resolve(cart_id).await?;
        if snapshot.is_empty() {
            return Err(ServiceError::CartNotFound(cart_id));
        }

        let total = snapshot.effective_total();
        let unit_amount = to_minor_units(total)
            .filter(|amount| *amount > 0)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("cart total {} cannot be charged", total))
            })?;

        let request = CheckoutSessionRequest {
            cart_id,
            customer_email: buyer.email.clone(),
            product_name: buyer.name.clone(),
            unit_amount,
            currency: self.config.payment_currency.clone(),
            success_url: self.config.checkout_success_url(),
            cancel_url: self.config.payment_cancel_url.clone(),
            shipping_address: shipping_address.to_metadata()?,
        };

        let session = self.provider.create_checkout_session(request).await?;
        info!(session_id = %session.id, %unit_amount, "Checkout session started");

        self.event_sender.publish(Event::CheckoutSessionStarted {
            cart_id,
            session_id: session.id.clone(),
        });

        Ok(SessionReference {
            session_id: session.id,
            url: session.url,
        })
    }
}
