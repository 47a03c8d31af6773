//! Domain models for the marketplace.
//!
//! Row types derive `sqlx::FromRow` and are shared by the `PostgreSQL` and
//! in-memory repositories. Fields that must not leave the service (database
//! ids of private rows, password hashes) are skipped when serializing.

pub mod basket;
pub mod catalog;
pub mod customer;
pub mod order;
pub mod session;

pub use basket::BasketLine;
pub use catalog::{
    NewStore, Product, ProductCategory, ProductCategoryView, ProductImport, ProductUpsert, Store,
    StoreCategory, StoreCategoryView, StoreUpdate, StoreView,
};
pub use customer::{Customer, CustomerUpdate, NewCustomer};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems};
pub use session::SessionRecord;
