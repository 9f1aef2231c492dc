use crate::{
    entities::{order_item, payment_settlement, product},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    TransactionTrait,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Signed change to one product's stock and sold counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InventoryDelta {
    pub product_id: Uuid,
    pub quantity_delta: i32,
    pub sold_delta: i32,
}

impl InventoryDelta {
    /// Stock leaves the shelf and is counted as sold.
    pub fn sale(product_id: Uuid, quantity: i32) -> Self {
        Self {
            product_id,
            quantity_delta: -quantity,
            sold_delta: quantity,
        }
    }
}

/// Per-line sale deltas for a settled order.
pub fn deltas_for_items(items: &[order_item::Model]) -> Vec<InventoryDelta> {
    items
        .iter()
        .map(|item| InventoryDelta::sale(item.product_id, item.quantity))
        .collect()
}

/// Outcome of a recovery sweep. One failing order never blocks the others.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub recovered: usize,
    pub failed: Vec<Uuid>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct InventoryLedger {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
}

impl InventoryLedger {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Applies every delta in one transaction; nothing is applied if any product is missing.
    #[instrument(skip(self, deltas), fields(count = deltas.len()))]
    pub async fn apply(&self, deltas: &[InventoryDelta]) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        if let Err(e) = apply_with(&txn, deltas).await {
            txn.rollback().await?;
            return Err(e);
        }
        txn.commit().await?;
        Ok(())
    }

    /// Applies an order's deltas exactly once, keyed by order id.
    ///
    /// Returns `false` when the order was already reconciled.
    #[instrument(skip(self))]
    pub async fn reconcile_order(&self, order_id: Uuid) -> Result<bool, ServiceError> {
        let txn = self.db.begin().await?;

        let claimed = payment_settlement::Entity::update_many()
            .col_expr(
                payment_settlement::Column::InventoryAppliedAt,
                Expr::value(Utc::now()),
            )
            .filter(payment_settlement::Column::OrderId.eq(order_id))
            .filter(payment_settlement::Column::InventoryAppliedAt.is_null())
            .exec(&txn)
            .await?
            .rows_affected;

        if claimed == 0 {
            let known = payment_settlement::Entity::find()
                .filter(payment_settlement::Column::OrderId.eq(order_id))
                .one(&txn)
                .await?
                .is_some();
            txn.rollback().await?;
            return if known {
                info!(%order_id, "Inventory already reconciled");
                Ok(false)
            } else {
                Err(ServiceError::NotFound(format!(
                    "settlement for order {}",
                    order_id
                )))
            };
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;
        let deltas = deltas_for_items(&items);

        if let Err(e) = apply_with(&txn, &deltas).await {
            error!(%order_id, "Inventory reconciliation failed: {}", e);
            txn.rollback().await?;
            return Err(e);
        }
        txn.commit().await?;

        counter!("inventory.reconciled", 1);
        self.event_sender.publish(Event::InventoryAdjusted {
            order_id,
            product_count: deltas.len(),
            units: deltas.iter().map(|d| i64::from(d.sold_delta)).sum(),
        });
        info!(%order_id, lines = deltas.len(), "Inventory reconciled");
        Ok(true)
    }

    /// Reconciles every settlement whose inventory step never completed.
    #[instrument(skip(self))]
    pub async fn reconcile_pending(&self) -> Result<RecoveryReport, ServiceError> {
        let pending = payment_settlement::Entity::find()
            .filter(payment_settlement::Column::InventoryAppliedAt.is_null())
            .all(&*self.db)
            .await?;

        let mut report = RecoveryReport::default();
        for record in pending {
            match self.reconcile_order(record.order_id).await {
                Ok(true) => report.recovered += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(order_id = %record.order_id, "Could not reconcile order: {}", e);
                    report.failed.push(record.order_id);
                }
            }
        }

        if report.recovered > 0 || !report.is_clean() {
            warn!(
                recovered = report.recovered,
                failed = report.failed.len(),
                "Reconciled settlements with unapplied inventory"
            );
        }
        Ok(report)
    }
}

/// Atomic per-product increments on `conn`. Products are touched in id order.
async fn apply_with<C>(conn: &C, deltas: &[InventoryDelta]) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let mut merged: BTreeMap<Uuid, (i32, i32)> = BTreeMap::new();
    for delta in deltas {
        let entry = merged.entry(delta.product_id).or_insert((0, 0));
        entry.0 += delta.quantity_delta;
        entry.1 += delta.sold_delta;
    }

    for (product_id, (quantity_delta, sold_delta)) in merged {
        let updated = product::Entity::update_many()
            .col_expr(
                product::Column::Quantity,
                Expr::col(product::Column::Quantity).add(quantity_delta),
            )
            .col_expr(
                product::Column::Sold,
                Expr::col(product::Column::Sold).add(sold_delta),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?
            .rows_affected;

        if updated == 0 {
            return Err(ServiceError::NotFound(format!("product {}", product_id)));
        }

        // Stock may go negative; flagged, not prevented.
        if quantity_delta < 0 {
            if let Some(p) = product::Entity::find_by_id(product_id).one(conn).await? {
                if p.quantity < 0 {
                    warn!(%product_id, quantity = p.quantity, "Product stock is negative");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_delta_moves_stock_to_sold() {
        let id = Uuid::new_v4();
        let delta = InventoryDelta::sale(id, 3);
        assert_eq!(delta.quantity_delta, -3);
        assert_eq!(delta.sold_delta, 3);
        assert_eq!(delta.quantity_delta + delta.sold_delta, 0);
    }

    #[test]
    fn order_deltas_mirror_line_quantities() {
        let order_id = Uuid::new_v4();
        let items: Vec<order_item::Model> = [2, 5, 1]
            .iter()
            .enumerate()
            .map(|(i, qty)| order_item::Model {
                id: Uuid::new_v4(),
                order_id,
                product_id: Uuid::new_v4(),
                quantity: *qty,
                price: rust_decimal::Decimal::ONE,
                total_product_discount: None,
                position: i as i32,
            })
            .collect();

        let deltas = deltas_for_items(&items);
        let stock: i32 = deltas.iter().map(|d| d.quantity_delta).sum();
        let sold: i32 = deltas.iter().map(|d| d.sold_delta).sum();
        assert_eq!(stock, -8);
        assert_eq!(sold, 8);
    }

    mod with_db {
        use super::*;
        use crate::{
            dto::ShippingAddress,
            entities::UserRole,
            services::{Buyer, CartSnapshotReader, OrderFactory, PaymentContext},
            test_support,
        };
        use assert_matches::assert_matches;
        use rust_decimal_macros::dec;

        async fn stock_of(db: &DatabaseConnection, id: Uuid) -> (i32, i32) {
            let p = product::Entity::find_by_id(id).one(db).await.unwrap().unwrap();
            (p.quantity, p.sold)
        }

        #[tokio::test]
        async fn batch_is_all_or_nothing() {
            let db = test_support::memory_db().await;
            let (events, _rx) = test_support::events();
            let ledger = InventoryLedger::new(db.clone(), events);
            let shelf = test_support::seed_product(&db, dec!(4), 10, None).await;

            let missing = Uuid::new_v4();
            let result = ledger
                .apply(&[
                    InventoryDelta::sale(shelf.id, 3),
                    InventoryDelta::sale(missing, 1),
                ])
                .await;
            assert_matches!(result, Err(ServiceError::NotFound(_)));
            assert_eq!(stock_of(&db, shelf.id).await, (10, 0));

            ledger
                .apply(&[InventoryDelta::sale(shelf.id, 3), InventoryDelta::sale(shelf.id, 2)])
                .await
                .unwrap();
            assert_eq!(stock_of(&db, shelf.id).await, (5, 5));
        }

        #[tokio::test]
        async fn stock_may_go_negative() {
            let db = test_support::memory_db().await;
            let (events, _rx) = test_support::events();
            let ledger = InventoryLedger::new(db.clone(), events);
            let scarce = test_support::seed_product(&db, dec!(1), 1, None).await;

            ledger.apply(&[InventoryDelta::sale(scarce.id, 3)]).await.unwrap();
            assert_eq!(stock_of(&db, scarce.id).await, (-2, 3));
        }

        #[tokio::test]
        async fn pending_orders_reconcile_exactly_once() {
            let db = test_support::memory_db().await;
            let (events, _rx) = test_support::events();
            let ledger = InventoryLedger::new(db.clone(), events);
            let user = test_support::seed_user(&db, "nour@example.com", UserRole::User).await;
            let item = test_support::seed_product(&db, dec!(7), 6, None).await;
            let cart = test_support::seed_cart(&db, user.id, &[(item.id, 4, dec!(7))]).await;

            let snapshot = CartSnapshotReader::new(db.clone()).resolve(cart.id).await.unwrap();
            let address = ShippingAddress {
                street: "1 Nile St".into(),
                city: "Luxor".into(),
                phone: "01000000001".into(),
                details: None,
            };
            let order = OrderFactory::new(db.clone())
                .create(&snapshot, &Buyer::from(user), &address, &PaymentContext::cash())
                .await
                .unwrap();

            assert_eq!(ledger.reconcile_pending().await.unwrap().recovered, 1);
            assert_eq!(ledger.reconcile_pending().await.unwrap(), RecoveryReport::default());
            assert!(!ledger.reconcile_order(order.order.id).await.unwrap());
            assert_eq!(stock_of(&db, item.id).await, (2, 4));
        }

        #[tokio::test]
        async fn failed_order_does_not_block_pending_sweep() {
            let db = test_support::memory_db().await;
            let (events, _rx) = test_support::events();
            let ledger = InventoryLedger::new(db.clone(), events);
            let user = test_support::seed_user(&db, "karim@example.com", UserRole::User).await;
            let gone = test_support::seed_product(&db, dec!(3), 4, None).await;
            let kept = test_support::seed_product(&db, dec!(5), 9, None).await;
            let buyer = Buyer::from(user.clone());
            let factory = OrderFactory::new(db.clone());
            let reader = CartSnapshotReader::new(db.clone());
            let address = ShippingAddress {
                street: "4 Corniche".into(),
                city: "Alexandria".into(),
                phone: "01000000002".into(),
                details: None,
            };

            let mut order_ids = Vec::new();
            for (product_id, price) in [(gone.id, dec!(3)), (kept.id, dec!(5))] {
                let cart = test_support::seed_cart(&db, user.id, &[(product_id, 1, price)]).await;
                let snapshot = reader.resolve(cart.id).await.unwrap();
                let details = factory
                    .create(&snapshot, &buyer, &address, &PaymentContext::cash())
                    .await
                    .unwrap();
                order_ids.push(details.order.id);
            }
            product::Entity::delete_by_id(gone.id).exec(&*db).await.unwrap();

            let report = ledger.reconcile_pending().await.unwrap();
            assert_eq!(report.recovered, 1);
            assert_eq!(report.failed, vec![order_ids[0]]);
            assert!(!report.is_clean());
            assert_eq!(stock_of(&db, kept.id).await, (8, 1));
        }

        #[tokio::test]
        async fn unknown_order_is_not_found() {
            let db = test_support::memory_db().await;
            let (events, _rx) = test_support::events();
            let ledger = InventoryLedger::new(db, events);
            assert_matches!(
                ledger.reconcile_order(Uuid::new_v4()).await,
                Err(ServiceError::NotFound(_))
            );
        }
    }
}
