use super::order::PaymentMethod;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Settlement ledger row, one per order.
///
/// `(cart_id, payment_method, is_paid)` is unique at the storage layer, which is what
/// collapses duplicate webhook deliveries and concurrent verification calls into a
/// single order. `inventory_applied_at` doubles as the reconciliation flag.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub cart_id: Uuid,
    pub payment_method: PaymentMethod,
    pub is_paid: bool,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    #[sea_orm(nullable)]
    pub session_reference: Option<String>,
    #[sea_orm(nullable)]
    pub inventory_applied_at: Option<DateTime<Utc>>,
    #[sea_orm(nullable)]
    pub cart_consumed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_reconciled(&self) -> bool {
        self.inventory_applied_at.is_some()
    }
}
