//! Session token records.

use chrono::{DateTime, Utc};

use marketplace_core::CustomerId;

/// The single live session of a customer.
///
/// Only a keyed digest of the bearer secret is stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SessionRecord {
    pub customer_id: CustomerId,
    pub token_digest: String,
    pub created_at: DateTime<Utc>,
}
