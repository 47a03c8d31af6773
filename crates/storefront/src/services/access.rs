//! Object-level ownership checks.
//!
//! Whether a failed check reveals the resource depends on its visibility:
//! private resources (orders) answer `NotFound` so their existence does not
//! leak, public ones (stores, categories, products) answer `Forbidden`.

use thiserror::Error;

use marketplace_core::CustomerId;

use crate::models::{Customer, Order, Store, StoreCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    Public,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("You do not own this {0}")]
    Forbidden(&'static str),
}

/// A resource with an owning customer.
pub trait Owned {
    /// Human-readable resource name used in error messages.
    const KIND: &'static str;
    const VISIBILITY: Visibility;

    /// `None` when the resource has no owner any more.
    fn owner(&self) -> Option<CustomerId>;
}

impl Owned for Order {
    const KIND: &'static str = "Order";
    const VISIBILITY: Visibility = Visibility::Private;

    fn owner(&self) -> Option<CustomerId> {
        Some(self.customer_id)
    }
}

impl Owned for Store {
    const KIND: &'static str = "store";
    const VISIBILITY: Visibility = Visibility::Public;

    fn owner(&self) -> Option<CustomerId> {
        Some(self.owner_id)
    }
}

impl Owned for StoreCategory {
    const KIND: &'static str = "store category";
    const VISIBILITY: Visibility = Visibility::Public;

    fn owner(&self) -> Option<CustomerId> {
        self.created_by
    }
}

/// Require `customer` to own `resource`.
///
/// # Errors
///
/// Returns `AccessError::NotFound` for private and `AccessError::Forbidden`
/// for public resources owned by someone else.
pub fn ensure_owner<T: Owned>(resource: &T, customer: &Customer) -> Result<(), AccessError> {
    if resource.owner() == Some(customer.id) {
        return Ok(());
    }

    tracing::debug!(
        customer_id = %customer.id,
        kind = T::KIND,
        "Ownership check failed"
    );

    match T::VISIBILITY {
        Visibility::Private => Err(AccessError::NotFound(T::KIND)),
        Visibility::Public => Err(AccessError::Forbidden(T::KIND)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use marketplace_core::{Email, Money, OrderId, OrderNumber, OrderStatus, StoreCategoryId, StoreId};

    use super::*;

    fn customer(id: i32) -> Customer {
        Customer {
            id: CustomerId::new(id),
            email: Email::parse(&format!("c{id}@example.com")).unwrap(),
            password_hash: String::new(),
            email_verified: true,
            is_active: true,
            user_name: format!("c{id}"),
            first_name: String::new(),
            last_name: String::new(),
            phone_number: String::new(),
            organization: None,
            address: None,
            area_code: 1,
            is_vendor: true,
            seller_vendor_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn foreign_order_is_not_found() {
        let order = Order {
            id: OrderId::new(1),
            order_number: OrderNumber::new(5000).unwrap(),
            customer_id: CustomerId::new(1),
            area_code: 1,
            total_price: Money::ZERO,
            final_delivery_price: Money::ZERO,
            express_delivery: false,
            status: OrderStatus::New,
            created_at: Utc::now(),
        };

        assert!(ensure_owner(&order, &customer(1)).is_ok());
        assert_eq!(
            ensure_owner(&order, &customer(2)),
            Err(AccessError::NotFound("Order"))
        );
    }

    #[test]
    fn foreign_store_is_forbidden() {
        let store = Store {
            id: StoreId::new(3),
            owner_id: CustomerId::new(1),
            name: "Hammers".to_owned(),
            address: "2 Side St".to_owned(),
            url: None,
            nominal_delivery_price: Money::from_units(10),
            status: true,
        };

        assert_eq!(
            ensure_owner(&store, &customer(2)),
            Err(AccessError::Forbidden("store"))
        );
    }

    #[test]
    fn orphaned_category_belongs_to_nobody() {
        let category = StoreCategory {
            id: StoreCategoryId::new(1),
            store_cat_id: 10,
            name: "Tools".to_owned(),
            created_by: None,
        };

        assert!(ensure_owner(&category, &customer(1)).is_err());
    }
}
