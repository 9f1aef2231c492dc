//! Narrow interface to the hosted payment provider.

pub mod signature;
pub mod stripe;

use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub use signature::WebhookVerifier;
pub use stripe::StripeClient;

/// Metadata key under which the shipping address travels through the provider.
pub const SHIPPING_ADDRESS_METADATA_KEY: &str = "shippingAddress";

pub const CHECKOUT_COMPLETED_EVENT: &str = "checkout.session.completed";

/// A single aggregate charge for one cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub cart_id: Uuid,
    pub customer_email: String,
    pub product_name: String,
    /// Minor currency units.
    pub unit_amount: i64,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Opaque JSON string, echoed back verbatim in the completed session.
    pub shipping_address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

/// Checkout session as reported by the provider.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct CheckoutSessionDetails {
    pub id: String,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSessionDetails {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn buyer_email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| {
                self.customer_details
                    .as_ref()
                    .and_then(|d| d.email.as_deref())
            })
            .filter(|e| !e.trim().is_empty())
    }

    pub fn cart_id(&self) -> Result<Uuid, ServiceError> {
        let raw = self.client_reference_id.as_deref().ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "session {} carries no cart reference",
                self.id
            ))
        })?;
        Uuid::parse_str(raw).map_err(|_| {
            ServiceError::ValidationError(format!("session {} has malformed cart reference", self.id))
        })
    }

    pub fn shipping_address_payload(&self) -> Option<&str> {
        self.metadata
            .get(SHIPPING_ADDRESS_METADATA_KEY)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Envelope of a signed provider notification.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

impl WebhookEvent {
    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED_EVENT
    }

    pub fn checkout_session(&self) -> Result<CheckoutSessionDetails, ServiceError> {
        serde_json::from_value(self.data.object.clone()).map_err(|e| {
            ServiceError::ValidationError(format!("malformed checkout session in event {}: {}", self.id, e))
        })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError>;

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, ServiceError>;
}
