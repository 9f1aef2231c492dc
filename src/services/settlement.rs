use super::{
    Buyer, CartSnapshot, CartSnapshotReader, InventoryLedger, OrderDetails, OrderFactory,
    PaymentContext, RecoveryReport,
};
use crate::{
    dto::ShippingAddress,
    entities::{order, order_item, payment_settlement, PaymentMethod},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// The one settlement procedure shared by the cash and card paths.
///
/// Order persistence commits before inventory is touched, and inventory commits before the
/// cart is consumed. Each later step is idempotent, so [`Settlement::finish`] can resume an
/// interrupted run.
#[derive(Clone)]
pub struct Settlement {
    db: Arc<DatabaseConnection>,
    carts: CartSnapshotReader,
    factory: OrderFactory,
    ledger: InventoryLedger,
    event_sender: EventSender,
}

impl Settlement {
    pub fn new(db: Arc<DatabaseConnection>, ledger: InventoryLedger, event_sender: EventSender) -> Self {
        Self {
            carts: CartSnapshotReader::new(db.clone()),
            factory: OrderFactory::new(db.clone()),
            db,
            ledger,
            event_sender,
        }
    }

    pub fn carts(&self) -> &CartSnapshotReader {
        &self.carts
    }

    #[instrument(skip_all, fields(cart_id = %snapshot.cart_id, method = %payment.method))]
    pub async fn settle(
        &self,
        snapshot: &CartSnapshot,
        buyer: &Buyer,
        shipping_address: &ShippingAddress,
        payment: PaymentContext,
    ) -> Result<OrderDetails, ServiceError> {
        let details = self
            .factory
            .create(snapshot, buyer, shipping_address, &payment)
            .await?;
        let order_id = details.order.id;

        counter!("settlement.orders_created", 1, "method" => payment.method.to_string());
        self.event_sender.publish(Event::OrderCreated {
            order_id,
            buyer_id: buyer.id,
            payment_method: payment.method,
            total: details.order.total_order_price,
        });
        if payment.is_paid {
            self.event_sender.publish(Event::OrderPaid {
                order_id,
                session_reference: payment.session_reference.clone(),
            });
        }

        if let Err(e) = self.ledger.reconcile_order(order_id).await {
            error!(%order_id, "Order persisted but inventory not applied: {}", e);
            return Err(e);
        }

        self.consume_cart(order_id, snapshot.cart_id, buyer.id, payment.method)
            .await?;

        info!(%order_id, "Settlement completed");
        Ok(details)
    }

    /// Completes whatever steps an earlier run of this settlement left undone.
    #[instrument(skip_all, fields(order_id = %record.order_id))]
    pub async fn finish(
        &self,
        record: &payment_settlement::Model,
    ) -> Result<OrderDetails, ServiceError> {
        let details = self.load_order(record.order_id).await?;

        if !record.is_reconciled() {
            warn!("Resuming settlement with unapplied inventory");
            self.ledger.reconcile_order(record.order_id).await?;
        }
        if record.cart_consumed_at.is_none() {
            self.consume_cart(
                record.order_id,
                record.cart_id,
                details.order.user_id,
                record.payment_method,
            )
            .await?;
        }

        Ok(details)
    }

    /// Settlement record for the natural key, if the cart already settled this way.
    pub async fn find_settled(
        &self,
        cart_id: Uuid,
        method: PaymentMethod,
        is_paid: bool,
    ) -> Result<Option<payment_settlement::Model>, ServiceError> {
        Ok(payment_settlement::Entity::find()
            .filter(payment_settlement::Column::CartId.eq(cart_id))
            .filter(payment_settlement::Column::PaymentMethod.eq(method))
            .filter(payment_settlement::Column::IsPaid.eq(is_paid))
            .one(&*self.db)
            .await?)
    }

    /// Resumes every settlement left incomplete by a crash or a failed step.
    #[instrument(skip(self))]
    pub async fn recover_incomplete(&self) -> Result<RecoveryReport, ServiceError> {
        let incomplete = payment_settlement::Entity::find()
            .filter(
                payment_settlement::Column::InventoryAppliedAt
                    .is_null()
                    .or(payment_settlement::Column::CartConsumedAt.is_null()),
            )
            .all(&*self.db)
            .await?;

        let mut report = RecoveryReport::default();
        for record in &incomplete {
            match self.finish(record).await {
                Ok(_) => report.recovered += 1,
                Err(e) => {
                    error!(order_id = %record.order_id, "Could not resume settlement: {}", e);
                    report.failed.push(record.order_id);
                }
            }
        }
        if !incomplete.is_empty() {
            warn!(
                recovered = report.recovered,
                failed = report.failed.len(),
                "Resumed incomplete settlements"
            );
        }
        Ok(report)
    }

    pub async fn load_order(&self, order_id: Uuid) -> Result<OrderDetails, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", order_id)))?;
        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Position)
            .all(&*self.db)
            .await?;
        Ok(OrderDetails { order, items })
    }

    async fn consume_cart(
        &self,
        order_id: Uuid,
        cart_id: Uuid,
        owner_id: Uuid,
        method: PaymentMethod,
    ) -> Result<(), ServiceError> {
        // Card events may name a stale cart, so the buyer's current cart goes too.
        let mut removed = 0;
        if method == PaymentMethod::Card {
            removed += self.carts.consume_by_owner(owner_id).await?;
        }
        removed += self.carts.consume(cart_id).await?;

        payment_settlement::Entity::update_many()
            .col_expr(
                payment_settlement::Column::CartConsumedAt,
                Expr::value(Utc::now()),
            )
            .filter(payment_settlement::Column::OrderId.eq(order_id))
            .filter(payment_settlement::Column::CartConsumedAt.is_null())
            .exec(&*self.db)
            .await?;

        self.event_sender.publish(Event::CartConsumed {
            cart_id: Some(cart_id),
            owner_id,
            carts_removed: removed,
        });
        Ok(())
    }
}
