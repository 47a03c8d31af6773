//! Per-customer basket.
//!
//! A line is keyed by (customer, product, store). Adding a product that is
//! already in the basket overwrites its quantity. Lines are drained only by
//! order placement, inside the checkout transaction.

use thiserror::Error;
use tracing::instrument;

use marketplace_core::StockNumber;

use crate::db::{Repository, RepositoryError};
use crate::models::{BasketLine, Customer};

#[derive(Debug, Error)]
pub enum BasketError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("Product {0} not found")]
    ProductNotFound(StockNumber),

    /// The product exists but its store is missing or switched off.
    #[error("No active vendor for product {0}")]
    NoActiveVendor(StockNumber),

    #[error("Product {0} is not in the basket")]
    NotInBasket(StockNumber),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct BasketService<'a> {
    repo: &'a dyn Repository,
}

impl<'a> BasketService<'a> {
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Put `quantity` units of a product into the basket, replacing any
    /// previous quantity.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` for a quantity below 1; `ProductNotFound` or
    /// `NoActiveVendor` when the product cannot be bought.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn add_or_update(
        &self,
        customer: &Customer,
        stock_number: StockNumber,
        quantity: i32,
    ) -> Result<BasketLine, BasketError> {
        if quantity < 1 {
            return Err(BasketError::InvalidQuantity);
        }

        let product = self
            .repo
            .product_by_stock_number(stock_number)
            .await?
            .ok_or(BasketError::ProductNotFound(stock_number))?;

        let store = self
            .repo
            .store_by_id(product.store_id)
            .await?
            .filter(|store| store.status)
            .ok_or(BasketError::NoActiveVendor(stock_number))?;

        let line = self
            .repo
            .upsert_basket_line(customer.id, product.id, store.id, quantity)
            .await?;
        tracing::debug!(line_id = %line.id, quantity, "Basket line saved");
        Ok(line)
    }

    /// Remove a product from the basket.
    ///
    /// # Errors
    ///
    /// `NotInBasket` when the stock number is unknown or was never added.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn remove(
        &self,
        customer: &Customer,
        stock_number: StockNumber,
    ) -> Result<(), BasketError> {
        let product = self
            .repo
            .product_by_stock_number(stock_number)
            .await?
            .ok_or(BasketError::NotInBasket(stock_number))?;

        let removed = self
            .repo
            .remove_basket_product(customer.id, product.id)
            .await?;
        if removed == 0 {
            return Err(BasketError::NotInBasket(stock_number));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    pub async fn list(&self, customer: &Customer) -> Result<Vec<BasketLine>, BasketError> {
        Ok(self.repo.basket_lines(customer.id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marketplace_core::{Email, Money, StoreCategoryId};

    use super::*;
    use crate::db::{CustomerRepository, MemoryRepository, ProductRepository, StoreRepository};
    use crate::models::{NewCustomer, NewStore, ProductUpsert, StoreUpdate};

    struct Fixture {
        repo: MemoryRepository,
        buyer: Customer,
        store_id: marketplace_core::StoreId,
    }

    async fn fixture() -> Fixture {
        let repo = MemoryRepository::new();
        let mut customers = Vec::new();
        for (email, vendor_id) in [("vendor@example.com", Some(900)), ("buyer@example.com", None)] {
            customers.push(
                repo.create_customer(&NewCustomer {
                    email: Email::parse(email).unwrap(),
                    password_hash: "x".to_owned(),
                    user_name: email.to_owned(),
                    first_name: String::new(),
                    last_name: String::new(),
                    phone_number: "+1000".to_owned(),
                    organization: None,
                    address: Some("1 Main St".to_owned()),
                    area_code: 2,
                    is_vendor: vendor_id.is_some(),
                    seller_vendor_id: vendor_id,
                })
                .await
                .unwrap(),
            );
        }
        let buyer = customers.pop().unwrap();
        let vendor = customers.pop().unwrap();

        let category: StoreCategoryId = repo
            .upsert_store_category(10, "Tools", vendor.id)
            .await
            .unwrap()
            .id;
        let store = repo
            .create_store(
                &NewStore {
                    owner_id: vendor.id,
                    name: "Hammers".to_owned(),
                    address: "2 Side St".to_owned(),
                    url: None,
                    nominal_delivery_price: Money::from_units(10),
                    status: true,
                },
                category,
            )
            .await
            .unwrap();

        repo.upsert_product(&ProductUpsert {
            stock_number: StockNumber::new(42).unwrap(),
            name: "Claw hammer".to_owned(),
            model: None,
            store_id: store.id,
            category_id: None,
            price: Money::from_units(100),
            recommended_price: Money::from_units(120),
            weight_class: 2,
            amount: 5,
            description: None,
        })
        .await
        .unwrap();

        Fixture {
            repo,
            buyer,
            store_id: store.id,
        }
    }

    fn stock(n: i64) -> StockNumber {
        StockNumber::new(n).unwrap()
    }

    #[tokio::test]
    async fn re_adding_overwrites_quantity() {
        let f = fixture().await;
        let basket = BasketService::new(&f.repo);

        basket.add_or_update(&f.buyer, stock(42), 3).await.unwrap();
        basket.add_or_update(&f.buyer, stock(42), 1).await.unwrap();

        let lines = basket.list(&f.buyer).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 1);
        assert_eq!(lines[0].store_name, "Hammers");
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let f = fixture().await;
        let err = BasketService::new(&f.repo)
            .add_or_update(&f.buyer, stock(42), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, BasketError::InvalidQuantity));
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let f = fixture().await;
        let err = BasketService::new(&f.repo)
            .add_or_update(&f.buyer, stock(7), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BasketError::ProductNotFound(n) if n == stock(7)));
    }

    #[tokio::test]
    async fn inactive_store_cannot_sell() {
        let f = fixture().await;
        f.repo
            .update_store(
                f.store_id,
                &StoreUpdate {
                    status: Some(false),
                    ..StoreUpdate::default()
                },
                None,
            )
            .await
            .unwrap();

        let err = BasketService::new(&f.repo)
            .add_or_update(&f.buyer, stock(42), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, BasketError::NoActiveVendor(_)));
    }

    #[tokio::test]
    async fn removing_absent_line_is_not_found() {
        let f = fixture().await;
        let basket = BasketService::new(&f.repo);

        assert!(matches!(
            basket.remove(&f.buyer, stock(42)).await,
            Err(BasketError::NotInBasket(_))
        ));

        basket.add_or_update(&f.buyer, stock(42), 2).await.unwrap();
        basket.remove(&f.buyer, stock(42)).await.unwrap();
        assert!(basket.list(&f.buyer).await.unwrap().is_empty());
    }
}
