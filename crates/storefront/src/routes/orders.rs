//! Order route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use marketplace_core::OrderNumber;

use crate::error::{ApiJson, AppError, Result, add_breadcrumb};
use crate::middleware::RequireCustomer;
use crate::models::{Order, OrderWithItems};
use crate::routes::Message;
use crate::services::orders::OrderService;
use crate::state::AppState;

fn order_service(state: &AppState) -> OrderService<'_> {
    OrderService::new(state.repo(), state.jobs(), state.config().total_pricing)
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaceOrderRequest {
    #[serde(default)]
    pub express_delivery: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteOrderRequest {
    pub order_number: OrderNumber,
}

/// POST /api/v1/order
#[instrument(skip_all)]
pub async fn place(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>)> {
    let placed = order_service(&state)
        .place_order(&customer, req.express_delivery)
        .await?;
    let order_number = placed.order.order_number.to_string();
    add_breadcrumb(
        "order",
        "Order placed",
        Some(&[("order_number", order_number.as_str())]),
    );
    Ok((StatusCode::CREATED, Json(placed)))
}

/// GET /api/v1/order
pub async fn list(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(order_service(&state).list(&customer).await?))
}

/// GET /api/v1/order-detail/{order_slug}
pub async fn show(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(order_slug): Path<String>,
) -> Result<Json<OrderWithItems>> {
    // A malformed slug cannot name an order.
    let number: OrderNumber = order_slug
        .parse()
        .map_err(|_| AppError::NotFound("Order not found".to_owned()))?;
    Ok(Json(order_service(&state).get(&customer, number).await?))
}

/// DELETE /api/v1/order
pub async fn delete(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<DeleteOrderRequest>,
) -> Result<Json<Message>> {
    order_service(&state)
        .delete(&customer, req.order_number)
        .await?;
    Ok(Message::new(format!("Order {} deleted", req.order_number)))
}
