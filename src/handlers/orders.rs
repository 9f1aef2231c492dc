use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use tracing::info;
use uuid::Uuid;

use super::common::{created_response, success_response, validate_input, SUCCESS};
use crate::{
    auth::AuthenticatedUser,
    dto::{
        CreateOrderRequest, OrderEnvelope, OrderListResponse, OrderView, ReconcileResponse,
        SessionEnvelope, VerifyPaymentRequest,
    },
    entities::UserRole,
    errors::ServiceError,
    AppState,
};

const BUYER_ROLES: &[UserRole] = &[UserRole::User, UserRole::Admin];

pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_my_orders))
        .route("/:cart_id", post(create_cash_order))
        .route("/checkout/:cart_id", post(create_checkout_session))
        .route("/verify-payment", post(verify_payment))
        .route("/admin/:order_id/reconcile", post(reconcile_order))
}

/// POST /api/v1/orders/{cart_id}
pub async fn create_cash_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(cart_id): Path<Uuid>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_any(BUYER_ROLES)?;
    validate_input(&request)?;

    let details = state
        .services
        .orders
        .create_cash_order(cart_id, &user.as_buyer(), &request.shipping_address)
        .await?;

    Ok(created_response(OrderEnvelope {
        message: SUCCESS.to_string(),
        order: details.into(),
    }))
}

/// GET /api/v1/orders
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<OrderListResponse>, ServiceError> {
    user.require_any(BUYER_ROLES)?;

    let orders: Vec<OrderView> = state
        .services
        .orders
        .list_for_buyer(user.id)
        .await?
        .into_iter()
        .map(OrderView::from)
        .collect();

    Ok(Json(OrderListResponse {
        message: SUCCESS.to_string(),
        results: orders.len(),
        orders,
    }))
}

/// POST /api/v1/orders/checkout/{cart_id}
pub async fn create_checkout_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(cart_id): Path<Uuid>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_any(BUYER_ROLES)?;
    validate_input(&request)?;

    let session = state
        .services
        .checkout
        .start(cart_id, &user.as_buyer(), &request.shipping_address)
        .await?;

    Ok(success_response(SessionEnvelope {
        message: SUCCESS.to_string(),
        session,
    }))
}

/// POST /api/v1/orders/verify-payment
///
/// Fallback for buyers returning from the hosted page before the webhook lands.
pub async fn verify_payment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_any(BUYER_ROLES)?;
    validate_input(&request)?;

    let outcome = state
        .services
        .payments
        .verify_session(&request.session_id)
        .await?;

    let (status, message) = if outcome.created {
        (StatusCode::CREATED, SUCCESS)
    } else {
        (StatusCode::OK, "Order already exists")
    };
    Ok((
        status,
        Json(OrderEnvelope {
            message: message.to_string(),
            order: outcome.order.into(),
        }),
    ))
}

/// POST /api/v1/orders/admin/{order_id}/reconcile
pub async fn reconcile_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ReconcileResponse>, ServiceError> {
    user.require_any(&[UserRole::Admin])?;

    let applied = state.services.ledger.reconcile_order(order_id).await?;
    info!(%order_id, applied, admin_id = %user.id, "Manual inventory reconciliation");

    Ok(Json(ReconcileResponse { order_id, applied }))
}
