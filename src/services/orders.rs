use super::{Buyer, OrderDetails, PaymentContext, Settlement};
use crate::{
    dto::ShippingAddress,
    entities::{order, order_item},
    errors::ServiceError,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Buyer-facing order operations: cash checkout and order history.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    settlement: Settlement,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, settlement: Settlement) -> Self {
        Self { db, settlement }
    }

    /// Cash on delivery: settles the cart synchronously as an unpaid order.
    #[instrument(skip(self, buyer, shipping_address), fields(buyer_id = %buyer.id))]
    pub async fn create_cash_order(
        &self,
        cart_id: Uuid,
        buyer: &Buyer,
        shipping_address: &ShippingAddress,
    ) -> Result<OrderDetails, ServiceError> {
        let snapshot = self.settlement.carts().resolve(cart_id).await?;
        let details = self
            .settlement
            .settle(&snapshot, buyer, shipping_address, PaymentContext::cash())
            .await?;

        info!(order_id = %details.order.id, "Cash order created");
        Ok(details)
    }

    /// The buyer's own orders, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_buyer(&self, buyer_id: Uuid) -> Result<Vec<OrderDetails>, ServiceError> {
        let orders = order::Entity::find()
            .filter(order::Column::UserId.eq(buyer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order = load_items(&self.db, ids).await?;

        Ok(orders
            .into_iter()
            .map(|order| OrderDetails {
                items: items_by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}

/// Order lines grouped by order id, each group in cart order.
pub(crate) async fn load_items(
    db: &DatabaseConnection,
    order_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, Vec<order_item::Model>>, ServiceError> {
    if order_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let items = order_item::Entity::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .order_by_asc(order_item::Column::Position)
        .all(db)
        .await?;

    let mut grouped: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
    for item in items {
        grouped.entry(item.order_id).or_default().push(item);
    }
    Ok(grouped)
}
