use crate::{
    entities::{cart, cart_item},
    errors::ServiceError,
};
use rust_decimal::Decimal;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// One cart line as read at settlement time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_discount: Option<Decimal>,
}

/// Frozen view of a cart. Later edits to the cart or catalog do not affect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    pub cart_id: Uuid,
    pub owner_id: Uuid,
    pub items: Vec<CartLine>,
    pub total_price: Decimal,
    pub total_price_after_discount: Option<Decimal>,
}

impl CartSnapshot {
    /// Discounted total when one is present and non-zero, otherwise the plain total.
    pub fn effective_total(&self) -> Decimal {
        match self.total_price_after_discount {
            Some(discounted) if !discounted.is_zero() => discounted,
            _ => self.total_price,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone)]
pub struct CartSnapshotReader {
    db: Arc<DatabaseConnection>,
}

impl CartSnapshotReader {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Reads a cart and its lines. Carts already claimed by a settlement are reported as absent.
    #[instrument(skip(self))]
    pub async fn resolve(&self, cart_id: Uuid) -> Result<CartSnapshot, ServiceError> {
        let db = &*self.db;

        let cart = cart::Entity::find_by_id(cart_id)
            .filter(cart::Column::SettlingOrderId.is_null())
            .one(db)
            .await?
            .ok_or(ServiceError::CartNotFound(cart_id))?;

        let items = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .order_by_asc(cart_item::Column::Position)
            .all(db)
            .await?;

        Ok(CartSnapshot {
            cart_id: cart.id,
            owner_id: cart.user_id,
            items: items
                .into_iter()
                .map(|item| CartLine {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.price,
                    line_discount: item.total_product_discount,
                })
                .collect(),
            total_price: cart.total_price,
            total_price_after_discount: cart.total_price_after_discount,
        })
    }

    /// Deletes a cart and its lines. Returns the number of carts removed (0 or 1).
    #[instrument(skip(self))]
    pub async fn consume(&self, cart_id: Uuid) -> Result<u64, ServiceError> {
        self.delete_carts(vec![cart_id]).await
    }

    /// Deletes every cart owned by `user_id`.
    #[instrument(skip(self))]
    pub async fn consume_by_owner(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let cart_ids: Vec<Uuid> = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        if cart_ids.is_empty() {
            debug!(%user_id, "No cart left to consume for owner");
            return Ok(0);
        }

        self.delete_carts(cart_ids).await
    }

    async fn delete_carts(&self, cart_ids: Vec<Uuid>) -> Result<u64, ServiceError> {
        let txn = self.db.begin().await?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.is_in(cart_ids.clone()))
            .exec(&txn)
            .await?;
        let removed = cart::Entity::delete_many()
            .filter(cart::Column::Id.is_in(cart_ids))
            .exec(&txn)
            .await?
            .rows_affected;

        txn.commit().await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(total: Decimal, after_discount: Option<Decimal>) -> CartSnapshot {
        CartSnapshot {
            cart_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            items: vec![],
            total_price: total,
            total_price_after_discount: after_discount,
        }
    }

    #[test]
    fn effective_total_prefers_discount() {
        assert_eq!(
            snapshot(dec!(100), Some(dec!(80))).effective_total(),
            dec!(80)
        );
    }

    #[test]
    fn zero_or_missing_discount_falls_back_to_total() {
        assert_eq!(snapshot(dec!(100), Some(dec!(0))).effective_total(), dec!(100));
        assert_eq!(snapshot(dec!(100), None).effective_total(), dec!(100));
    }
}
