pub mod common;
pub mod health;
pub mod orders;
pub mod payment_webhooks;
pub mod reports;

use crate::{
    config::AppConfig,
    events::EventSender,
    payments::{PaymentProvider, WebhookVerifier},
    services::{
        CartSnapshotReader, CheckoutSessionInitiator, InventoryLedger, OrderService,
        PaymentEventProcessor, SellerReportAggregator, Settlement,
    },
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutSessionInitiator>,
    pub payments: Arc<PaymentEventProcessor>,
    pub reports: Arc<SellerReportAggregator>,
    pub ledger: Arc<InventoryLedger>,
    pub settlement: Arc<Settlement>,
}

impl AppServices {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        provider: Arc<dyn PaymentProvider>,
        event_sender: EventSender,
    ) -> Self {
        let ledger = InventoryLedger::new(db.clone(), event_sender.clone());
        let settlement = Settlement::new(db.clone(), ledger.clone(), event_sender.clone());
        let verifier = WebhookVerifier::new(
            config.payment_webhook_secret.clone(),
            config.webhook_tolerance_secs,
        );

        let checkout = CheckoutSessionInitiator::new(
            CartSnapshotReader::new(db.clone()),
            provider.clone(),
            config,
            event_sender,
        );
        let payments =
            PaymentEventProcessor::new(db.clone(), provider, verifier, settlement.clone());

        Self {
            orders: Arc::new(OrderService::new(db.clone(), settlement.clone())),
            checkout: Arc::new(checkout),
            payments: Arc::new(payments),
            reports: Arc::new(SellerReportAggregator::new(db)),
            ledger: Arc::new(ledger),
            settlement: Arc::new(settlement),
        }
    }
}
