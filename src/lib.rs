//! Storefront settlement core
//!
//! Turns shopping carts into orders for cash and card payments, keeps product stock in step
//! with what was sold, and reports sales per seller.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod dto;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod payments;
pub mod services;
pub mod tracing;

use axum::Router;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::{config::AppConfig, events::EventSender, handlers::AppServices, payments::PaymentProvider};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub event_sender: EventSender,
    pub services: AppServices,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: Arc<AppConfig>,
        provider: Arc<dyn PaymentProvider>,
        event_sender: EventSender,
    ) -> Self {
        let services =
            AppServices::new(db.clone(), config.clone(), provider, event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            services,
        }
    }
}

pub fn api_v1_routes() -> Router<AppState> {
    let orders = handlers::orders::orders_routes().merge(handlers::reports::reports_routes());

    Router::new()
        .nest("/health", handlers::health::health_routes())
        .nest("/orders", orders)
        .nest("/payments", handlers::payment_webhooks::webhook_routes())
}

/// The full HTTP application with request ids, tracing and CORS applied.
pub fn app(state: AppState) -> Router {
    let cors = if state.config.is_development() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .nest("/api/v1", api_v1_routes())
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::{
        entities::{cart, cart_item, product, user, UserRole},
        events::{Event, EventSender},
    };
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    pub async fn memory_db() -> Arc<DatabaseConnection> {
        Arc::new(crate::db::connect_in_memory().await.unwrap())
    }

    pub fn events() -> (EventSender, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(64);
        (EventSender::new(tx), rx)
    }

    pub async fn seed_user(db: &DatabaseConnection, email: &str, role: UserRole) -> user::Model {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(email.split('@').next().unwrap_or(email).to_string()),
            email: Set(email.to_string()),
            phone: Set(Some("0100000000".to_string())),
            role: Set(role),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .unwrap()
    }

    pub async fn seed_product(
        db: &DatabaseConnection,
        price: Decimal,
        quantity: i32,
        seller_id: Option<Uuid>,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(format!("product-{}", &Uuid::new_v4().to_string()[..8])),
            price: Set(price),
            quantity: Set(quantity),
            sold: Set(0),
            seller_id: Set(seller_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap()
    }

    /// Cart owned by `owner` holding `(product, quantity, unit price)` lines.
    pub async fn seed_cart(
        db: &DatabaseConnection,
        owner: Uuid,
        lines: &[(Uuid, i32, Decimal)],
    ) -> cart::Model {
        let total: Decimal = lines.iter().map(|(_, q, p)| *p * Decimal::from(*q)).sum();
        let now = Utc::now();
        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(owner),
            total_price: Set(total),
            total_price_after_discount: Set(None),
            settling_order_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();

        for (position, (product_id, quantity, price)) in lines.iter().enumerate() {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(*product_id),
                quantity: Set(*quantity),
                price: Set(*price),
                total_product_discount: Set(None),
                position: Set(position as i32),
            }
            .insert(db)
            .await
            .unwrap();
        }
        cart
    }
}
