#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, DatabaseConnection, EntityTrait, PaginatorTrait, Set,
};
use serde_json::{json, Value};
use storefront_settlement::{
    auth::{encode_token, AuthenticatedUser},
    config::AppConfig,
    db,
    entities::{cart, cart_item, order, product, user, UserRole},
    errors::ServiceError,
    events::{self, EventSender},
    payments::{
        CheckoutSession, CheckoutSessionDetails, CheckoutSessionRequest, PaymentProvider,
        WebhookVerifier, SHIPPING_ADDRESS_METADATA_KEY,
    },
    AppState,
};
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const WEBHOOK_SECRET: &str = "whsec_integration_test_secret";

/// In-memory stand-in for the hosted payment provider.
#[derive(Default)]
pub struct FakeProvider {
    sessions: Mutex<HashMap<String, CheckoutSessionDetails>>,
    requests: Mutex<Vec<CheckoutSessionRequest>>,
    counter: AtomicUsize,
}

impl FakeProvider {
    /// Registers a session as the provider would report it after the buyer paid.
    pub fn insert_session(&self, details: CheckoutSessionDetails) {
        self.sessions
            .lock()
            .unwrap()
            .insert(details.id.clone(), details);
    }

    pub fn mark_paid(&self, session_id: &str) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(session_id) {
            session.payment_status = "paid".to_string();
        }
    }

    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, ServiceError> {
        let id = format!("cs_test_{}", self.counter.fetch_add(1, Ordering::SeqCst) + 1);
        self.insert_session(CheckoutSessionDetails {
            id: id.clone(),
            payment_status: "unpaid".to_string(),
            client_reference_id: Some(request.cart_id.to_string()),
            customer_email: Some(request.customer_email.clone()),
            customer_details: None,
            amount_total: Some(request.unit_amount),
            metadata: HashMap::from([(
                SHIPPING_ADDRESS_METADATA_KEY.to_string(),
                request.shipping_address.clone(),
            )]),
        });
        self.requests.lock().unwrap().push(request);
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.test/{}", id)),
            id,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSessionDetails, ServiceError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("checkout session {}", session_id)))
    }
}

/// Helper harness for driving the application over an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub provider: Arc<FakeProvider>,
    verifier: WebhookVerifier,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new("sqlite::memory:", "development");
        cfg.jwt_secret = JWT_SECRET.to_string();
        cfg.payment_webhook_secret = WEBHOOK_SECRET.to_string();

        let pool = db::connect_in_memory()
            .await
            .expect("failed to open in-memory database");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let provider = Arc::new(FakeProvider::default());
        let verifier = WebhookVerifier::new(WEBHOOK_SECRET, cfg.webhook_tolerance_secs);
        let state = AppState::new(
            Arc::new(pool),
            Arc::new(cfg),
            provider.clone(),
            EventSender::new(event_tx),
        );

        Self {
            router: storefront_settlement::app(state.clone()),
            state,
            provider,
            verifier,
            _event_task: event_task,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.state.db
    }

    pub fn token_for(&self, user: &user::Model) -> String {
        let identity = AuthenticatedUser {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
        };
        encode_token(&identity, JWT_SECRET, chrono::Duration::hours(1)).expect("encode token")
    }

    /// Send a JSON request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).expect("serialize request body"))
            }
            None => Body::empty(),
        };

        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    /// Deliver a webhook exactly as the provider would: raw bytes plus signature header.
    pub async fn post_webhook(&self, payload: &[u8], signature: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/webhook")
            .header("content-type", "application/json");
        if let Some(sig) = signature {
            builder = builder.header("stripe-signature", sig);
        }
        self.send(
            builder
                .body(Body::from(payload.to_vec()))
                .expect("failed to build request"),
        )
        .await
    }

    pub fn sign(&self, payload: &[u8]) -> String {
        self.verifier
            .sign(payload, Utc::now().timestamp())
            .expect("sign payload")
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn seed_user(&self, email: &str, role: UserRole) -> user::Model {
        user::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(email.split('@').next().unwrap_or(email).to_string()),
            email: Set(email.to_string()),
            phone: Set(Some("01000000000".to_string())),
            role: Set(role),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed user")
    }

    pub async fn seed_product(
        &self,
        title: &str,
        price: Decimal,
        quantity: i32,
        seller_id: Option<Uuid>,
    ) -> product::Model {
        let now = Utc::now();
        product::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(title.to_string()),
            price: Set(price),
            quantity: Set(quantity),
            sold: Set(0),
            seller_id: Set(seller_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.db())
        .await
        .expect("seed product")
    }

    /// Cart holding `(product id, quantity)` lines at each product's current price.
    pub async fn seed_cart(&self, owner: Uuid, lines: &[(&product::Model, i32)]) -> cart::Model {
        let total: Decimal = lines
            .iter()
            .map(|(p, q)| p.price * Decimal::from(*q))
            .sum();
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
        .insert(self.db())
        .await
        .expect("seed cart");

        for (position, (product, quantity)) in lines.iter().enumerate() {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(*quantity),
                price: Set(product.price),
                total_product_discount: Set(None),
                position: Set(position as i32),
            }
            .insert(self.db())
            .await
            .expect("seed cart item");
        }
        cart
    }

    pub async fn product(&self, id: Uuid) -> product::Model {
        product::Entity::find_by_id(id)
            .one(self.db())
            .await
            .expect("load product")
            .expect("product exists")
    }

    pub async fn cart_exists(&self, id: Uuid) -> bool {
        cart::Entity::find_by_id(id)
            .one(self.db())
            .await
            .expect("load cart")
            .is_some()
    }

    pub async fn order_count(&self) -> u64 {
        order::Entity::find()
            .count(self.db())
            .await
            .expect("count orders")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn shipping_address() -> Value {
    json!({
        "street": "12 Corniche Rd",
        "city": "Alexandria",
        "phone": "01123456789",
        "details": "4th floor"
    })
}

/// A `checkout.session.completed` event for `cart_id`, paid in minor units.
pub fn checkout_completed(event_id: &str, session_id: &str, cart_id: Uuid, email: &str, amount_total: i64) -> Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "payment_status": "paid",
                "client_reference_id": cart_id.to_string(),
                "customer_email": email,
                "amount_total": amount_total,
                "metadata": {
                    "shippingAddress": shipping_address().to_string()
                }
            }
        }
    })
}

/// Paid session as the provider returns it from a lookup.
pub fn paid_session(session_id: &str, cart_id: Uuid, email: &str, amount_total: i64) -> CheckoutSessionDetails {
    CheckoutSessionDetails {
        id: session_id.to_string(),
        payment_status: "paid".to_string(),
        client_reference_id: Some(cart_id.to_string()),
        customer_email: Some(email.to_string()),
        customer_details: None,
        amount_total: Some(amount_total),
        metadata: HashMap::from([(
            SHIPPING_ADDRESS_METADATA_KEY.to_string(),
            shipping_address().to_string(),
        )]),
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
