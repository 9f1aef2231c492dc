//! Request and response payloads of the HTTP surface.

use crate::{
    entities::PaymentMethod,
    errors::ServiceError,
    services::{OrderDetails, SessionReference},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Delivery address supplied by the buyer and stored verbatim on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 200))]
    pub street: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 3, max = 32))]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 500))]
    pub details: Option<String>,
}

impl ShippingAddress {
    pub fn to_json(&self) -> Result<serde_json::Value, ServiceError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Opaque string form carried through the payment provider's metadata.
    pub fn to_metadata(&self) -> Result<String, ServiceError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses and validates the metadata string echoed back by the provider.
    pub fn from_metadata(raw: &str) -> Result<Self, ServiceError> {
        let address: ShippingAddress = serde_json::from_str(raw).map_err(|e| {
            ServiceError::ValidationError(format!("malformed shipping address payload: {}", e))
        })?;
        address.validate()?;
        Ok(address)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate]
    pub shipping_address: ShippingAddress,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    #[validate(length(min = 1, max = 255))]
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_product_discount: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub cart_items: Vec<OrderLineView>,
    pub total_order_price: Decimal,
    pub shipping_address: serde_json::Value,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderDetails> for OrderView {
    fn from(details: OrderDetails) -> Self {
        let OrderDetails { order, items } = details;
        Self {
            id: order.id,
            user_id: order.user_id,
            cart_items: items
                .into_iter()
                .map(|item| OrderLineView {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                    total_product_discount: item.total_product_discount,
                })
                .collect(),
            total_order_price: order.total_order_price,
            shipping_address: order.shipping_address,
            payment_method: order.payment_method,
            is_paid: order.is_paid,
            paid_at: order.paid_at,
            is_delivered: order.is_delivered,
            delivered_at: order.delivered_at,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderEnvelope {
    pub message: String,
    pub order: OrderView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub message: String,
    pub results: usize,
    pub orders: Vec<OrderView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionEnvelope {
    pub message: String,
    pub session: SessionReference,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub order_id: Uuid,
    pub applied: bool,
}
