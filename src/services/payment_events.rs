use super::{Buyer, CartSnapshot, OrderDetails, PaymentContext, Settlement};
use crate::{
    dto::ShippingAddress,
    entities::{user, PaymentMethod},
    errors::ServiceError,
    payments::{CheckoutSessionDetails, PaymentProvider, WebhookEvent, WebhookVerifier},
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Facts extracted from a confirmed card payment.
#[derive(Debug, Clone, PartialEq)]
pub struct CardPayment {
    pub cart_id: Uuid,
    pub buyer_email: String,
    /// Minor currency units as reported by the provider.
    pub amount_total: i64,
    pub shipping_address: ShippingAddress,
    pub session_reference: String,
}

impl CardPayment {
    pub fn from_session(session: &CheckoutSessionDetails) -> Result<Self, ServiceError> {
        let buyer_email = session.buyer_email().ok_or_else(|| {
            ServiceError::ValidationError(format!("session {} has no customer email", session.id))
        })?;
        let amount_total = session.amount_total.ok_or_else(|| {
            ServiceError::ValidationError(format!("session {} has no amount", session.id))
        })?;
        let raw_address = session.shipping_address_payload().ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "session {} has no shipping address",
                session.id
            ))
        })?;

        Ok(Self {
            cart_id: session.cart_id()?,
            buyer_email: buyer_email.to_string(),
            amount_total,
            shipping_address: ShippingAddress::from_metadata(raw_address)?,
            session_reference: session.id.clone(),
        })
    }

    pub fn charged_total(&self) -> Decimal {
        Decimal::new(self.amount_total, 2)
    }
}

/// Result of a card settlement attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementOutcome {
    pub order: OrderDetails,
    /// `false` when an earlier delivery had already settled this cart.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    Settled(SettlementOutcome),
    Ignored { event_type: String },
}

/// Turns confirmed card payments into orders, exactly once per cart.
#[derive(Clone)]
pub struct PaymentEventProcessor {
    db: Arc<DatabaseConnection>,
    provider: Arc<dyn PaymentProvider>,
    verifier: WebhookVerifier,
    settlement: Settlement,
}

impl PaymentEventProcessor {
    pub fn new(
        db: Arc<DatabaseConnection>,
        provider: Arc<dyn PaymentProvider>,
        verifier: WebhookVerifier,
        settlement: Settlement,
    ) -> Self {
        Self {
            db,
            provider,
            verifier,
            settlement,
        }
    }

    /// Webhook entry point. Nothing is read or written before the signature checks out.
    #[instrument(skip_all, fields(payload_len = payload.len()))]
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, ServiceError> {
        let signature = signature.ok_or_else(|| {
            counter!("webhook.signature_rejected", 1);
            ServiceError::InvalidSignature("missing signature header".to_string())
        })?;
        if let Err(e) = self.verifier.verify(payload, signature) {
            counter!("webhook.signature_rejected", 1);
            warn!("Rejected webhook: {}", e);
            return Err(e);
        }

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::ValidationError(format!("malformed event: {}", e)))?;

        if !event.is_checkout_completed() {
            debug!(event_id = %event.id, event_type = %event.event_type, "Ignoring webhook event");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type,
            });
        }

        let payment = CardPayment::from_session(&event.checkout_session()?)?;
        info!(event_id = %event.id, cart_id = %payment.cart_id, "Checkout completed event received");

        self.settle_card(payment).await.map(WebhookOutcome::Settled)
    }

    /// Manual fallback when a webhook was missed: asks the provider for the session's state.
    #[instrument(skip(self))]
    pub async fn verify_session(&self, session_id: &str) -> Result<SettlementOutcome, ServiceError> {
        let session = self.provider.retrieve_checkout_session(session_id).await?;
        if !session.is_paid() {
            return Err(ServiceError::PaymentNotCompleted(format!(
                "session {} is {}",
                session.id, session.payment_status
            )));
        }

        self.settle_card(CardPayment::from_session(&session)?).await
    }

    #[instrument(skip_all, fields(cart_id = %payment.cart_id))]
    pub async fn settle_card(&self, payment: CardPayment) -> Result<SettlementOutcome, ServiceError> {
        let buyer: Buyer = user::Entity::find()
            .filter(user::Column::Email.eq(payment.buyer_email.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::BuyerNotFound(payment.buyer_email.clone()))?
            .into();

        if let Some(existing) = self.already_settled(payment.cart_id).await? {
            return Ok(existing);
        }

        let snapshot = match self.settlement.carts().resolve(payment.cart_id).await {
            Ok(snapshot) => snapshot,
            Err(ServiceError::CartNotFound(_)) => {
                // A concurrent delivery may have claimed the cart since the check above.
                return self
                    .already_settled(payment.cart_id)
                    .await?
                    .ok_or(ServiceError::CartNotFound(payment.cart_id));
            }
            Err(e) => return Err(e),
        };

        self.settle_snapshot(&snapshot, &buyer, &payment).await
    }

    /// Settles a resolved snapshot. Losing a race to a concurrent delivery, either at the cart
    /// claim or at the unique settlement key, yields the winner's order.
    async fn settle_snapshot(
        &self,
        snapshot: &CartSnapshot,
        buyer: &Buyer,
        payment: &CardPayment,
    ) -> Result<SettlementOutcome, ServiceError> {
        let context = PaymentContext::card_paid(
            payment.charged_total(),
            Some(payment.session_reference.clone()),
        );
        match self
            .settlement
            .settle(snapshot, buyer, &payment.shipping_address, context)
            .await
        {
            Ok(order) => Ok(SettlementOutcome {
                order,
                created: true,
            }),
            Err(err @ (ServiceError::Conflict(_) | ServiceError::CartNotFound(_))) => {
                self.already_settled(payment.cart_id).await?.ok_or(err)
            }
            Err(e) => Err(e),
        }
    }

    async fn already_settled(&self, cart_id: Uuid) -> Result<Option<SettlementOutcome>, ServiceError> {
        let Some(record) = self
            .settlement
            .find_settled(cart_id, PaymentMethod::Card, true)
            .await?
        else {
            return Ok(None);
        };

        counter!("settlement.duplicates_collapsed", 1);
        info!(order_id = %record.order_id, "Card payment already settled");
        let order = self.settlement.finish(&record).await?;
        Ok(Some(SettlementOutcome {
            order,
            created: false,
        }))
    }
}
