//! Orders and order items.
//!
//! An order is never edited after placement except for its status. Items
//! snapshot the stock number and unit price at placement time so later
//! catalog edits do not change order history.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketplace_core::{
    CustomerId, Money, OrderId, OrderItemId, OrderNumber, OrderStatus, ProductId, StockNumber,
    StoreId,
};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    #[serde(skip)]
    pub id: OrderId,
    pub order_number: OrderNumber,
    #[serde(skip)]
    pub customer_id: CustomerId,
    /// Region code at placement time.
    pub area_code: i32,
    pub total_price: Money,
    pub final_delivery_price: Money,
    pub express_delivery: bool,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    #[serde(skip)]
    pub id: OrderItemId,
    #[serde(skip)]
    pub order_id: OrderId,
    /// Product reference; the product may since have been removed.
    #[serde(skip)]
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub stock_number: StockNumber,
    pub unit_price: Money,
    pub quantity: i32,
}

/// Order detail representation.
#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: OrderNumber,
    pub customer_id: CustomerId,
    pub area_code: i32,
    pub total_price: Money,
    pub final_delivery_price: Money,
    pub express_delivery: bool,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub stock_number: StockNumber,
    pub unit_price: Money,
    pub quantity: i32,
}
