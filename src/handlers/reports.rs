use axum::{extract::State, response::Json, routing::get, Router};

use crate::{
    auth::AuthenticatedUser,
    entities::UserRole,
    errors::ServiceError,
    services::{AdminReport, SellerReport},
    AppState,
};

pub fn reports_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/sales", get(admin_sales))
        .route("/seller/orders", get(seller_orders))
}

/// GET /api/v1/orders/admin/sales
pub async fn admin_sales(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<AdminReport>, ServiceError> {
    user.require_any(&[UserRole::Admin])?;
    Ok(Json(state.services.reports.for_admin().await?))
}

/// GET /api/v1/orders/seller/orders
///
/// Only the caller's own product lines are returned, even for admins.
pub async fn seller_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<SellerReport>, ServiceError> {
    user.require_any(&[UserRole::Seller, UserRole::Admin])?;
    Ok(Json(state.services.reports.for_seller(user.id).await?))
}
