//! Customer domain types.
//!
//! A customer is both the buyer identity and, when `is_vendor` is set, the
//! owner of at most one store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use marketplace_core::{CustomerId, Email};

/// A marketplace customer.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Customer {
    pub id: CustomerId,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub email_verified: bool,
    pub is_active: bool,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub organization: Option<String>,
    /// Delivery address; orders cannot be placed without one.
    pub address: Option<String>,
    /// Region code used as the delivery price factor.
    pub area_code: i32,
    pub is_vendor: bool,
    /// Public vendor number, assigned at signup to vendors only.
    pub seller_vendor_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Saved delivery address, ignoring blank values.
    #[must_use]
    pub fn delivery_address(&self) -> Option<&str> {
        self.address.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }

    /// Name used to greet the customer in emails.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.first_name.trim().is_empty() {
            &self.user_name
        } else {
            &self.first_name
        }
    }
}

/// Fields for a new customer row.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: Email,
    pub password_hash: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub organization: Option<String>,
    pub address: Option<String>,
    pub area_code: i32,
    pub is_vendor: bool,
    pub seller_vendor_id: Option<i64>,
}

/// Partial profile update. `None` leaves the column unchanged.
#[derive(Debug, Clone, Default)]
pub struct CustomerUpdate {
    pub password_hash: Option<String>,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub organization: Option<String>,
    pub address: Option<String>,
    pub area_code: Option<i32>,
    /// Administrative only; not exposed through the profile endpoint.
    pub is_active: Option<bool>,
}
