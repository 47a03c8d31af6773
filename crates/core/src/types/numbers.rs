//! Externally visible catalog and order numbers.
//!
//! Stock numbers and order numbers are the identifiers customers and vendors
//! use for products and orders in URLs, so both are validated positive
//! integers with a stable slug form.

use core::fmt;
use core::ops::RangeInclusive;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Errors parsing a stock or order number.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NumberError {
    #[error("{kind} must be a whole number")]
    NotANumber { kind: &'static str },
    #[error("{kind} must be positive")]
    NotPositive { kind: &'static str },
}

macro_rules! positive_number {
    ($name:ident, $kind:literal) => {
        impl $name {
            /// Validate a raw value.
            ///
            /// # Errors
            ///
            /// Returns `NumberError::NotPositive` for zero or negative values.
            pub const fn new(value: i64) -> Result<Self, NumberError> {
                if value <= 0 {
                    return Err(NumberError::NotPositive { kind: $kind });
                }
                Ok(Self(value))
            }

            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }

            /// URL slug: the decimal rendering of the number.
            #[must_use]
            pub fn slug(&self) -> String {
                self.0.to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = NumberError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| NumberError::NotANumber { kind: $kind })?;
                Self::new(value)
            }
        }

        // Accept both `15` and `"15"`: form-style clients send numbers as strings.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Int(i64),
                    Text(String),
                }

                let parsed = match Raw::deserialize(deserializer)? {
                    Raw::Int(value) => Self::new(value),
                    Raw::Text(text) => text.parse(),
                };
                parsed.map_err(serde::de::Error::custom)
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl<'r> sqlx::Decode<'r, sqlx::Postgres> for $name {
            fn decode(
                value: sqlx::postgres::PgValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
                Ok(Self::new(raw)?)
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <i64 as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
            }
        }
    };
}

/// A product's stock number, unique across the catalog.
///
/// The product slug is derived from it, so `GET /goods/15` finds stock
/// number 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct StockNumber(i64);

positive_number!(StockNumber, "stock number");

/// A customer-facing order number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct OrderNumber(i64);

positive_number!(OrderNumber, "order number");

impl OrderNumber {
    /// Range random order numbers are drawn from.
    pub const RANGE: RangeInclusive<i64> = 2_000..=200_000_000;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn slug_is_decimal_rendering() {
        let stock = StockNumber::new(15).unwrap();
        assert_eq!(stock.slug(), "15");
        assert_eq!("15".parse::<StockNumber>().unwrap(), stock);
    }

    #[test]
    fn rejects_zero_negative_and_text() {
        assert_eq!(
            StockNumber::new(0),
            Err(NumberError::NotPositive {
                kind: "stock number"
            })
        );
        assert!(OrderNumber::new(-4).is_err());
        assert_eq!(
            "chars".parse::<OrderNumber>(),
            Err(NumberError::NotANumber {
                kind: "order number"
            })
        );
    }

    #[test]
    fn deserializes_from_number_or_string() {
        let a: OrderNumber = serde_json::from_str("4711").unwrap();
        let b: OrderNumber = serde_json::from_str("\"4711\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<OrderNumber>("\"x\"").is_err());
        assert!(serde_json::from_str::<StockNumber>("0").is_err());
    }

    #[test]
    fn order_number_range_is_positive() {
        assert!(OrderNumber::new(*OrderNumber::RANGE.start()).is_ok());
        assert!(OrderNumber::new(*OrderNumber::RANGE.end()).is_ok());
    }
}
