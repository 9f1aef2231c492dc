use crate::entities::PaymentMethod;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sender handle for domain events.
#[derive(Clone, Debug)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, waiting for channel capacity.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes without waiting. Dropped events are logged; settlement never fails on them.
    pub fn publish(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping domain event: {}", e);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        buyer_id: Uuid,
        payment_method: PaymentMethod,
        total: Decimal,
    },
    OrderPaid {
        order_id: Uuid,
        session_reference: Option<String>,
    },
    InventoryAdjusted {
        order_id: Uuid,
        product_count: usize,
        units: i64,
    },
    CartConsumed {
        cart_id: Option<Uuid>,
        owner_id: Uuid,
        carts_removed: u64,
    },
    CheckoutSessionStarted {
        cart_id: Uuid,
        session_id: String,
    },
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                payment_method,
                total,
                ..
            } => info!(%order_id, %payment_method, %total, "order created"),
            Event::OrderPaid {
                order_id,
                session_reference,
            } => info!(%order_id, session = ?session_reference, "order paid"),
            Event::InventoryAdjusted {
                order_id, units, ..
            } => info!(%order_id, units, "inventory adjusted"),
            Event::CartConsumed {
                owner_id,
                carts_removed,
                ..
            } => debug!(%owner_id, carts_removed, "cart consumed"),
            Event::CheckoutSessionStarted {
                cart_id,
                session_id,
            } => debug!(%cart_id, %session_id, "checkout session started"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_on_full_channel_does_not_block() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        let first = Event::OrderPaid {
            order_id: Uuid::new_v4(),
            session_reference: None,
        };

        sender.publish(first.clone());
        sender.publish(Event::OrderPaid {
            order_id: Uuid::new_v4(),
            session_reference: None,
        });

        assert_eq!(rx.recv().await, Some(first));
        assert!(rx.try_recv().is_err());
    }
}
