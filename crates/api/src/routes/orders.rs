//! Order placement, lookup and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{LineItem, Order, OrderId, PaymentResult, PriceBreakdown, ShippingAddress};
use domain::{MarkPaid, PlaceOrder, Principal};
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::{AdminUser, AuthUser};
use crate::{AppState, AppStore};

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    pub prices: PriceBreakdown,
}

/// Only the owner of an order and admins may see or pay it.
fn ensure_visible(principal: &Principal, order: &Order) -> Result<(), ApiError> {
    if order.user_id == principal.id || principal.is_admin {
        Ok(())
    } else {
        Err(ApiError::forbidden())
    }
}

// -- Handlers --

/// POST /api/orders: place an order for the caller, reserving stock.
#[tracing::instrument(skip(state, payload), fields(user_id = %user.id))]
pub async fn create<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(req) = payload?;
    let cmd = PlaceOrder::new(
        user.id,
        req.items,
        req.shipping_address,
        req.payment_method,
        req.prices,
    );
    let order = state.orders.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_mine<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_orders_for_user(user.id).await?))
}

/// GET /api/orders/all
#[tracing::instrument(skip(state))]
pub async fn list_all<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_all_orders().await?))
}

/// GET /api/orders/:id
#[tracing::instrument(skip(state))]
pub async fn get<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.get_order(id).await?;
    ensure_visible(&user, &order)?;
    Ok(Json(order))
}

/// PATCH /api/orders/:id/pay: record the payment provider's result.
#[tracing::instrument(skip(state, payload))]
pub async fn pay<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user): AuthUser,
    Path(id): Path<OrderId>,
    payload: Result<Json<PaymentResult>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let Json(payment_result) = payload?;
    let order = state.orders.get_order(id).await?;
    ensure_visible(&user, &order)?;

    let order = state
        .orders
        .mark_paid(MarkPaid::new(id, payment_result))
        .await?;
    Ok(Json(order))
}

/// PATCH /api/orders/:id/delivered
#[tracing::instrument(skip(state))]
pub async fn deliver<S: AppStore>(
    State(state): State<Arc<AppState<S>>>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.mark_delivered(id).await?))
}
