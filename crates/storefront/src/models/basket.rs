//! Basket lines.

use serde::Serialize;

use marketplace_core::{BasketLineId, CustomerId, Money, PricedLine, ProductId, StockNumber, StoreId};

/// A basket line joined with the product and vendor data needed to price it.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BasketLine {
    pub id: BasketLineId,
    #[serde(skip)]
    pub customer_id: CustomerId,
    #[serde(skip)]
    pub product_id: ProductId,
    pub store_id: StoreId,
    pub quantity: i32,
    pub stock_number: StockNumber,
    pub product_name: String,
    pub unit_price: Money,
    pub weight_class: i32,
    pub store_name: String,
    pub nominal_delivery_price: Money,
}

impl BasketLine {
    /// Input for the pricing calculator, `None` if a stored value is negative.
    #[must_use]
    pub fn priced(&self) -> Option<PricedLine> {
        Some(PricedLine {
            unit_price: self.unit_price,
            quantity: u32::try_from(self.quantity).ok()?,
            weight_class: u32::try_from(self.weight_class).ok()?,
            vendor_delivery_price: self.nominal_delivery_price,
        })
    }
}
