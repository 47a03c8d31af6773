//! Order pricing.
//!
//! Delivery is charged once per order, not per vendor: the single most
//! expensive vendor rate and the single heaviest item set the price, scaled by
//! the customer's region code and the express multiplier.
//!
//! ```text
//! delivery = area_code * max(vendor rate) * max(weight class) * (3 | 1)
//! ```

use core::str::FromStr;

use crate::Money;

/// Delivery multiplier for express orders.
pub const EXPRESS_MULTIPLIER: u32 = 3;

/// Delivery multiplier for standard orders.
pub const STANDARD_MULTIPLIER: u32 = 1;

/// How the goods total is derived from basket lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TotalPricing {
    /// Sum of unit prices, one per line regardless of quantity.
    #[default]
    Unit,
    /// Sum of unit price times quantity.
    Quantity,
}

impl FromStr for TotalPricing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unit" => Ok(Self::Unit),
            "quantity" => Ok(Self::Quantity),
            other => Err(format!(
                "invalid pricing policy '{other}', expected 'unit' or 'quantity'"
            )),
        }
    }
}

/// One basket line as seen by the calculator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: u32,
    pub weight_class: u32,
    pub vendor_delivery_price: Money,
}

/// Computed prices for a basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub total_price: Money,
    pub delivery_price: Money,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingError {
    #[error("cannot price an empty basket")]
    EmptyBasket,
    #[error("price calculation overflowed")]
    Overflow,
}

/// Price a basket.
///
/// # Errors
///
/// Returns [`PricingError::EmptyBasket`] when `lines` is empty and
/// [`PricingError::Overflow`] if any intermediate amount overflows.
pub fn quote(
    lines: &[PricedLine],
    area_code: u32,
    express: bool,
    policy: TotalPricing,
) -> Result<Quote, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyBasket);
    }

    let total_price = lines.iter().try_fold(Money::ZERO, |acc, line| {
        let line_total = match policy {
            TotalPricing::Unit => Some(line.unit_price),
            TotalPricing::Quantity => line.unit_price.checked_mul(line.quantity),
        }?;
        acc.checked_add(line_total)
    });
    let total_price = total_price.ok_or(PricingError::Overflow)?;

    let max_rate = lines
        .iter()
        .map(|line| line.vendor_delivery_price)
        .max()
        .unwrap_or(Money::ZERO);
    let max_weight = lines
        .iter()
        .map(|line| line.weight_class)
        .max()
        .unwrap_or(0);
    let multiplier = if express {
        EXPRESS_MULTIPLIER
    } else {
        STANDARD_MULTIPLIER
    };

    let delivery_price = max_rate
        .checked_mul(area_code)
        .and_then(|m| m.checked_mul(max_weight))
        .and_then(|m| m.checked_mul(multiplier))
        .ok_or(PricingError::Overflow)?;

    Ok(Quote {
        total_price,
        delivery_price,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn line(price: i64, quantity: u32, weight: u32, rate: i64) -> PricedLine {
        PricedLine {
            unit_price: Money::from_units(price),
            quantity,
            weight_class: weight,
            vendor_delivery_price: Money::from_units(rate),
        }
    }

    #[test]
    fn two_vendor_basket() {
        let lines = [line(100, 1, 2, 10), line(150, 1, 4, 7)];
        let quote = quote(&lines, 5, false, TotalPricing::Unit).unwrap();
        assert_eq!(quote.delivery_price, Money::from_units(200));
        assert_eq!(quote.total_price, Money::from_units(250));
    }

    #[test]
    fn express_triples_delivery() {
        let lines = [line(100, 1, 2, 10), line(150, 1, 4, 7)];
        let quote = quote(&lines, 5, true, TotalPricing::Unit).unwrap();
        assert_eq!(quote.delivery_price, Money::from_units(600));
        assert_eq!(quote.total_price, Money::from_units(250));
    }

    #[test]
    fn unit_policy_ignores_quantity() {
        let lines = [line(20, 3, 1, 5)];
        let unit = quote(&lines, 1, false, TotalPricing::Unit).unwrap();
        let by_qty = quote(&lines, 1, false, TotalPricing::Quantity).unwrap();
        assert_eq!(unit.total_price, Money::from_units(20));
        assert_eq!(by_qty.total_price, Money::from_units(60));
        assert_eq!(unit.delivery_price, by_qty.delivery_price);
    }

    #[test]
    fn rate_and_weight_maxima_may_come_from_different_lines() {
        let lines = [line(1, 1, 9, 1), line(1, 1, 1, 4)];
        let quote = quote(&lines, 2, false, TotalPricing::Unit).unwrap();
        assert_eq!(quote.delivery_price, Money::from_units(2 * 4 * 9));
    }

    #[test]
    fn fractional_rates_keep_precision() {
        let lines = [PricedLine {
            unit_price: Money::new(Decimal::new(999, 2)),
            quantity: 1,
            weight_class: 3,
            vendor_delivery_price: Money::new(Decimal::new(250, 2)),
        }];
        let quote = quote(&lines, 2, false, TotalPricing::Unit).unwrap();
        assert_eq!(quote.delivery_price.to_string(), "15.00");
        assert_eq!(quote.total_price.to_string(), "9.99");
    }

    #[test]
    fn empty_basket_is_rejected() {
        assert_eq!(
            quote(&[], 5, false, TotalPricing::Unit),
            Err(PricingError::EmptyBasket)
        );
    }

    #[test]
    fn overflow_is_reported() {
        let huge = PricedLine {
            unit_price: Money::new(Decimal::MAX),
            quantity: 2,
            weight_class: 1,
            vendor_delivery_price: Money::new(Decimal::MAX),
        };
        assert_eq!(
            quote(&[huge], 1, false, TotalPricing::Quantity),
            Err(PricingError::Overflow)
        );
        assert_eq!(
            quote(&[huge], 2, false, TotalPricing::Unit),
            Err(PricingError::Overflow)
        );
    }

    #[test]
    fn parses_policy_names() {
        assert_eq!("unit".parse::<TotalPricing>().unwrap(), TotalPricing::Unit);
        assert_eq!(
            " Quantity ".parse::<TotalPricing>().unwrap(),
            TotalPricing::Quantity
        );
        assert!("per-item".parse::<TotalPricing>().is_err());
    }
}
