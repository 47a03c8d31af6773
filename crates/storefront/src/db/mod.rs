//! Persistence for the marketplace.
//!
//! # Database: schema `marketplace`
//!
//! ## Tables
//!
//! - `customer` - Buyers and vendors (login identity, profile, region code)
//! - `session_token` - One bearer session digest per customer
//! - `store` - Vendor stores (one per vendor)
//! - `store_category`, `store_category_member` - Store categories
//! - `product_category` - Product categories
//! - `product` - Catalog, keyed externally by stock number
//! - `basket_line` - Per-customer basket
//! - `customer_order`, `order_item` - Placed orders
//!
//! # Repositories
//!
//! Access goes through the repository traits below. [`PgRepository`] is the
//! production implementation; [`MemoryRepository`] keeps everything in
//! process and backs the test suites.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p marketplace-cli -- migrate
//! ```

mod basket;
mod catalog;
mod customers;
pub mod memory;
mod orders;
mod sessions;

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use thiserror::Error;

use marketplace_core::{
    BasketLineId, CustomerId, Email, OrderId, OrderNumber, OrderStatus, ProductCategoryId,
    ProductId, StockNumber, StoreCategoryId, StoreId,
};

use crate::models::{
    BasketLine, Customer, CustomerUpdate, NewCustomer, NewOrder, NewOrderItem, NewStore, Order,
    OrderItem, Product, ProductCategory, ProductUpsert, SessionRecord, Store, StoreCategory,
    StoreUpdate,
};

pub use memory::MemoryRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map unique and foreign-key violations to [`RepositoryError::Conflict`].
fn conflict_or_database(e: sqlx::Error, message: impl FnOnce(Option<&str>) -> String) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && (db_err.is_unique_violation() || db_err.is_foreign_key_violation())
    {
        return RepositoryError::Conflict(message(db_err.constraint()));
    }
    RepositoryError::Database(e)
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// Connections use `marketplace` as the first schema on the search path so
/// the `order_status` enum resolves without qualification.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is invalid or the connection cannot be
/// established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    let options = PgConnectOptions::from_str(database_url.expose_secret())?
        .options([("search_path", "marketplace,public")]);

    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    /// Returns `Conflict` if the email or vendor id is taken.
    async fn create_customer(&self, new: &NewCustomer) -> Result<Customer, RepositoryError>;
    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn customer_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError>;
    /// Returns `NotFound` if the customer does not exist.
    async fn update_customer(
        &self,
        id: CustomerId,
        update: &CustomerUpdate,
    ) -> Result<Customer, RepositoryError>;
    async fn mark_email_verified(&self, id: CustomerId) -> Result<bool, RepositoryError>;
    /// Deletes the customer with their session, basket, store and orders.
    async fn delete_customer(&self, id: CustomerId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a session, replacing any previous one for the customer.
    async fn replace_session(
        &self,
        customer: CustomerId,
        token_digest: &str,
        created_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RepositoryError>;
    async fn session_for(
        &self,
        customer: CustomerId,
    ) -> Result<Option<SessionRecord>, RepositoryError>;
    async fn delete_session(&self, customer: CustomerId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait StoreRepository: Send + Sync {
    /// Create a store in `category`. Returns `Conflict` if the owner already has one.
    async fn create_store(
        &self,
        new: &NewStore,
        category: StoreCategoryId,
    ) -> Result<Store, RepositoryError>;
    async fn store_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError>;
    async fn store_by_owner(&self, owner: CustomerId) -> Result<Option<Store>, RepositoryError>;
    /// Apply `update` and, if given, add the store to `category`.
    async fn update_store(
        &self,
        id: StoreId,
        update: &StoreUpdate,
        category: Option<StoreCategoryId>,
    ) -> Result<Store, RepositoryError>;
    /// Deletes an empty store. Fails with `Conflict` while it still lists
    /// products.
    async fn delete_store(&self, id: StoreId) -> Result<bool, RepositoryError>;
    async fn categories_of_store(&self, id: StoreId)
    -> Result<Vec<StoreCategory>, RepositoryError>;

    async fn upsert_store_category(
        &self,
        store_cat_id: i64,
        name: &str,
        created_by: CustomerId,
    ) -> Result<StoreCategory, RepositoryError>;
    async fn store_category(
        &self,
        store_cat_id: i64,
    ) -> Result<Option<StoreCategory>, RepositoryError>;
    async fn stores_in_category(&self, id: StoreCategoryId)
    -> Result<Vec<Store>, RepositoryError>;
    /// Returns `Conflict` while stores are attached to the category.
    async fn delete_store_category(&self, id: StoreCategoryId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn upsert_product_category(
        &self,
        prod_cat_id: i64,
        name: &str,
    ) -> Result<ProductCategory, RepositoryError>;
    async fn product_category(
        &self,
        prod_cat_id: i64,
    ) -> Result<Option<ProductCategory>, RepositoryError>;
    async fn products_in_category(
        &self,
        id: ProductCategoryId,
    ) -> Result<Vec<Product>, RepositoryError>;
    /// Returns `Conflict` while products are attached to the category.
    async fn delete_product_category(
        &self,
        id: ProductCategoryId,
    ) -> Result<bool, RepositoryError>;

    async fn product_by_stock_number(
        &self,
        stock_number: StockNumber,
    ) -> Result<Option<Product>, RepositoryError>;
    /// Case-insensitive substring search over name and model; all products when `query` is `None`.
    async fn search_products(&self, query: Option<&str>) -> Result<Vec<Product>, RepositoryError>;
    async fn products_by_store(&self, store: StoreId) -> Result<Vec<Product>, RepositoryError>;
    /// Insert or update by stock number. Returns `Conflict` if the stock
    /// number belongs to a different store.
    async fn upsert_product(&self, product: &ProductUpsert) -> Result<Product, RepositoryError>;
    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait BasketRepository: Send + Sync {
    /// Insert the line or overwrite its quantity.
    async fn upsert_basket_line(
        &self,
        customer: CustomerId,
        product: ProductId,
        store: StoreId,
        quantity: i32,
    ) -> Result<BasketLine, RepositoryError>;
    async fn basket_lines(&self, customer: CustomerId) -> Result<Vec<BasketLine>, RepositoryError>;
    /// Remove every line of `product`; returns the number of lines removed.
    async fn remove_basket_product(
        &self,
        customer: CustomerId,
        product: ProductId,
    ) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Open a checkout transaction holding the customer's lock.
    ///
    /// Concurrent checkouts for the same customer wait here until the
    /// holder commits or drops its transaction. Returns `NotFound` if the
    /// customer does not exist.
    async fn begin_checkout(
        &self,
        customer: CustomerId,
    ) -> Result<Box<dyn CheckoutTransaction>, RepositoryError>;
    async fn orders_for(&self, customer: CustomerId) -> Result<Vec<Order>, RepositoryError>;
    async fn order_for(
        &self,
        customer: CustomerId,
        number: OrderNumber,
    ) -> Result<Option<Order>, RepositoryError>;
    async fn order_by_number(&self, number: OrderNumber) -> Result<Option<Order>, RepositoryError>;
    async fn order_items(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError>;
    /// Delete the order only if it is still in `expected` status.
    async fn delete_order(
        &self,
        order: OrderId,
        expected: OrderStatus,
    ) -> Result<bool, RepositoryError>;
    /// Compare-and-set the order status.
    async fn update_order_status(
        &self,
        order: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError>;
}

/// Unit of work for turning a basket into an order.
///
/// Nothing is visible to other readers until [`commit`](Self::commit);
/// dropping the transaction rolls everything back.
#[async_trait]
pub trait CheckoutTransaction: Send {
    /// The customer row, read under the lock.
    fn customer(&self) -> &Customer;
    async fn basket_lines(&mut self) -> Result<Vec<BasketLine>, RepositoryError>;
    /// Insert the order header. `None` means the order number is taken.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Option<Order>, RepositoryError>;
    async fn insert_item(
        &mut self,
        order: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItem, RepositoryError>;
    /// Delete all basket lines of the customer, returning their ids and
    /// quantities at the time of deletion.
    async fn drain_basket(&mut self) -> Result<Vec<(BasketLineId, i32)>, RepositoryError>;
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Everything the service layer needs from persistence.
#[async_trait]
pub trait Repository:
    CustomerRepository
    + SessionRepository
    + StoreRepository
    + ProductRepository
    + BasketRepository
    + OrderRepository
{
    /// Readiness probe.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed repository.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
