use super::{Buyer, CartSnapshot};
use crate::{
    dto::ShippingAddress,
    entities::{cart, order, order_item, payment_settlement, PaymentMethod},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// How an order is being paid for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentContext {
    pub method: PaymentMethod,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    /// Amount confirmed by the provider; overrides the cart total when present.
    pub charged_total: Option<Decimal>,
    pub session_reference: Option<String>,
}

impl PaymentContext {
    pub fn cash() -> Self {
        Self {
            method: PaymentMethod::Cash,
            is_paid: false,
            paid_at: None,
            charged_total: None,
            session_reference: None,
        }
    }

    pub fn card_paid(charged_total: Decimal, session_reference: Option<String>) -> Self {
        Self {
            method: PaymentMethod::Card,
            is_paid: true,
            paid_at: Some(Utc::now()),
            charged_total: Some(charged_total),
            session_reference,
        }
    }
}

/// A persisted order together with its copied line items.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

#[derive(Clone)]
pub struct OrderFactory {
    db: Arc<DatabaseConnection>,
}

impl OrderFactory {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persists an order built from `snapshot`.
    ///
    /// In one transaction the cart is claimed, the order and its lines are written and the
    /// settlement record is inserted. A cart claimed by another settlement yields
    /// `CartNotFound`; a clash on the settlement key yields `Conflict`.
    #[instrument(skip_all, fields(cart_id = %snapshot.cart_id, buyer_id = %buyer.id, method = %payment.method))]
    pub async fn create(
        &self,
        snapshot: &CartSnapshot,
        buyer: &Buyer,
        shipping_address: &ShippingAddress,
        payment: &PaymentContext,
    ) -> Result<OrderDetails, ServiceError> {
        if snapshot.is_empty() {
            return Err(ServiceError::EmptyCart(snapshot.cart_id));
        }
        if payment.is_paid && payment.paid_at.is_none() {
            return Err(ServiceError::InternalError(
                "paid order without payment timestamp".to_string(),
            ));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        let claimed = cart::Entity::update_many()
            .col_expr(cart::Column::SettlingOrderId, Expr::value(order_id))
            .col_expr(cart::Column::UpdatedAt, Expr::value(now))
            .filter(cart::Column::Id.eq(snapshot.cart_id))
            .filter(cart::Column::SettlingOrderId.is_null())
            .exec(&txn)
            .await?
            .rows_affected;
        if claimed == 0 {
            warn!("Cart vanished or was claimed by another settlement");
            txn.rollback().await?;
            return Err(ServiceError::CartNotFound(snapshot.cart_id));
        }

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(buyer.id),
            total_order_price: Set(payment
                .charged_total
                .unwrap_or_else(|| snapshot.effective_total())),
            shipping_address: Set(shipping_address.to_json()?),
            payment_method: Set(payment.method),
            is_paid: Set(payment.is_paid),
            paid_at: Set(payment.paid_at),
            is_delivered: Set(false),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut items = Vec::with_capacity(snapshot.items.len());
        for (position, line) in snapshot.items.iter().enumerate() {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                price: Set(line.unit_price),
                total_product_discount: Set(line.line_discount),
                position: Set(position as i32),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        let record = payment_settlement::ActiveModel {
            id: Set(Uuid::new_v4()),
            cart_id: Set(snapshot.cart_id),
            payment_method: Set(payment.method),
            is_paid: Set(payment.is_paid),
            order_id: Set(order_id),
            session_reference: Set(payment.session_reference.clone()),
            inventory_applied_at: Set(None),
            cart_consumed_at: Set(None),
            created_at: Set(now),
        };
        if let Err(e) = record.insert(&txn).await {
            txn.rollback().await?;
            return Err(if ServiceError::is_unique_violation(&e) {
                ServiceError::Conflict(format!(
                    "cart {} already settled by {}",
                    snapshot.cart_id, payment.method
                ))
            } else {
                e.into()
            });
        }

        txn.commit().await?;
        info!(%order_id, lines = items.len(), "Order persisted");

        Ok(OrderDetails { order, items })
    }
}
