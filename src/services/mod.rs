//! Settlement core: cart snapshots, order construction, inventory, payments and reports.

pub mod cart_snapshot;
pub mod checkout_session;
pub mod inventory_ledger;
pub mod order_factory;
pub mod orders;
pub mod payment_events;
pub mod seller_reports;
pub mod settlement;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use cart_snapshot::{CartLine, CartSnapshot, CartSnapshotReader};
pub use checkout_session::{CheckoutSessionInitiator, SessionReference};
pub use inventory_ledger::{InventoryDelta, InventoryLedger, RecoveryReport};
pub use order_factory::{OrderDetails, OrderFactory, PaymentContext};
pub use orders::OrderService;
pub use payment_events::{PaymentEventProcessor, SettlementOutcome, WebhookOutcome};
pub use seller_reports::{AdminReport, ReportStatistics, SellerReport, SellerReportAggregator};
pub use settlement::Settlement;

/// The paying customer of a settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl From<crate::entities::user::Model> for Buyer {
    fn from(user: crate::entities::user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}
