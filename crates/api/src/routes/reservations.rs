//! Goods reservation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use reservation::{OrderReserveStatus, ReservationService, ReserveRequest};
use serde::Serialize;
use stock_store::StockStorage;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: StockStorage> {
    pub reservations: ReservationService<S>,
}

impl<S: StockStorage> AppState<S> {
    pub fn new(reservations: ReservationService<S>) -> Self {
        Self { reservations }
    }
}

/// Empty JSON object returned by mutating endpoints on success.
#[derive(Serialize)]
pub struct Empty {}

/// POST /reserve/order/goods: reserve a batch of goods for an order.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn reserve<S: StockStorage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<ReserveRequest>,
) -> Result<Json<Empty>, ApiError> {
    state.reservations.reserve_goods_for_order(&req).await?;
    Ok(Json(Empty {}))
}

/// DELETE /unreserve/goods/{order_id}: release every reservation of an order.
#[tracing::instrument(skip(state))]
pub async fn unreserve<S: StockStorage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<Empty>, ApiError> {
    state
        .reservations
        .unreserve_goods_for_order(&OrderId::new(order_id))
        .await?;
    Ok(Json(Empty {}))
}

/// GET /check/reserve/status/{order_id}: report whether an order holds a
/// reservation.
#[tracing::instrument(skip(state))]
pub async fn status<S: StockStorage + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderReserveStatus>, ApiError> {
    let status = state
        .reservations
        .check_order_reserve(&OrderId::new(order_id))
        .await?;
    Ok(Json(status))
}
