//! Basket route handlers.

use axum::{Json, extract::State};
use serde::Deserialize;

use marketplace_core::StockNumber;

use crate::error::{ApiJson, Result};
use crate::middleware::RequireCustomer;
use crate::models::BasketLine;
use crate::routes::Message;
use crate::services::basket::BasketService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub stock_number: StockNumber,
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct RemoveRequest {
    pub stock_number: StockNumber,
}

/// GET /api/v1/basket
pub async fn list(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Vec<BasketLine>>> {
    let lines = BasketService::new(state.repo()).list(&customer).await?;
    Ok(Json(lines))
}

/// POST /api/v1/basket
///
/// Re-adding a product replaces its quantity.
pub async fn add(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<AddRequest>,
) -> Result<Json<BasketLine>> {
    let line = BasketService::new(state.repo())
        .add_or_update(&customer, req.stock_number, req.quantity)
        .await?;
    Ok(Json(line))
}

/// DELETE /api/v1/basket
pub async fn remove(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<RemoveRequest>,
) -> Result<Json<Message>> {
    BasketService::new(state.repo())
        .remove(&customer, req.stock_number)
        .await?;
    Ok(Message::new("Item removed from basket"))
}
