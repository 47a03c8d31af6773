//! Stores, categories and products.

use rand::Rng;
use thiserror::Error;
use tracing::instrument;

use marketplace_core::{Money, StockNumber, StoreId};

use crate::db::{Repository, RepositoryError};
use crate::models::{
    Customer, NewStore, Product, ProductCategory, ProductCategoryView, ProductImport,
    ProductUpsert, Store, StoreCategory, StoreCategoryView, StoreUpdate, StoreView,
};
use crate::services::access::{AccessError, ensure_owner};

/// Range for category ids assigned when the client does not pick one.
const GENERATED_CATEGORY_IDS: std::ops::RangeInclusive<i64> = 100..=2_000_000;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for CatalogError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Repository(other),
        }
    }
}

/// Fields of a new store.
#[derive(Debug, Clone)]
pub struct StoreInput {
    pub name: String,
    pub address: String,
    pub url: Option<String>,
    pub store_cat_id: i64,
    pub nominal_delivery_price: Money,
    pub status: Option<bool>,
}

/// Result of a product import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// One line per rejected record.
    pub rejected: Vec<String>,
}

pub struct CatalogService<'a> {
    repo: &'a dyn Repository,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// Open the caller's store.
    ///
    /// # Errors
    ///
    /// `FailedPrecondition` unless the caller is a registered vendor and the
    /// store category exists; `Conflict` if the caller already has a store.
    #[instrument(skip(self, owner, input), fields(customer_id = %owner.id))]
    pub async fn create_store(
        &self,
        owner: &Customer,
        input: StoreInput,
    ) -> Result<StoreView, CatalogError> {
        if !owner.is_vendor {
            return Err(CatalogError::FailedPrecondition(
                "You are not registered as a vendor".to_owned(),
            ));
        }
        let name = required("name", &input.name)?;
        let address = required("address", &input.address)?;
        non_negative("nominal_delivery_price", input.nominal_delivery_price)?;

        let category = self
            .repo
            .store_category(input.store_cat_id)
            .await?
            .ok_or_else(|| {
                CatalogError::FailedPrecondition(
                    "Please create a category for this store".to_owned(),
                )
            })?;

        let store = self
            .repo
            .create_store(
                &NewStore {
                    owner_id: owner.id,
                    name,
                    address,
                    url: input.url,
                    nominal_delivery_price: input.nominal_delivery_price,
                    status: input.status.unwrap_or(true),
                },
                category.id,
            )
            .await?;
        tracing::info!(store_id = %store.id, "Store created");

        self.view(store).await
    }

    /// The caller's own store.
    ///
    /// # Errors
    ///
    /// `NotFound` if the caller has no store.
    pub async fn own_store(&self, owner: &Customer) -> Result<StoreView, CatalogError> {
        let store = self.owned_store(owner).await?;
        self.view(store).await
    }

    /// Any store by id.
    ///
    /// # Errors
    ///
    /// `NotFound` if the store does not exist.
    pub async fn store(&self, id: StoreId) -> Result<StoreView, CatalogError> {
        let store = self
            .repo
            .store_by_id(id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Store not found".to_owned()))?;
        self.view(store).await
    }

    /// Edit the caller's store, optionally adding it to another category.
    ///
    /// # Errors
    ///
    /// `NotFound` if the caller has no store or the category does not exist.
    #[instrument(skip(self, owner, update), fields(customer_id = %owner.id))]
    pub async fn update_store(
        &self,
        owner: &Customer,
        update: StoreUpdate,
        store_cat_id: Option<i64>,
    ) -> Result<StoreView, CatalogError> {
        if let Some(price) = update.nominal_delivery_price {
            non_negative("nominal_delivery_price", price)?;
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(CatalogError::Validation("name must not be empty".to_owned()));
        }

        let store = self.owned_store(owner).await?;

        let category = match store_cat_id {
            Some(id) => Some(
                self.repo
                    .store_category(id)
                    .await?
                    .ok_or_else(|| CatalogError::NotFound("Store category not found".to_owned()))?
                    .id,
            ),
            None => None,
        };

        let store = self.repo.update_store(store.id, &update, category).await?;
        self.view(store).await
    }

    /// Close the caller's store.
    ///
    /// # Errors
    ///
    /// `NotFound` if the caller has no store; `Conflict` while it still lists
    /// products.
    #[instrument(skip(self, owner), fields(customer_id = %owner.id))]
    pub async fn delete_store(&self, owner: &Customer) -> Result<(), CatalogError> {
        let store = self.owned_store(owner).await?;

        let deleted = match self.repo.delete_store(store.id).await {
            Ok(deleted) => deleted,
            Err(RepositoryError::Conflict(_)) => {
                return Err(CatalogError::Conflict(format!(
                    "Store {} still lists products",
                    store.name
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if !deleted {
            return Err(CatalogError::NotFound("Store not found".to_owned()));
        }
        tracing::info!(store_id = %store.id, "Store deleted");
        Ok(())
    }

    async fn owned_store(&self, owner: &Customer) -> Result<Store, CatalogError> {
        self.repo
            .store_by_owner(owner.id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Store not found".to_owned()))
    }

    async fn view(&self, store: Store) -> Result<StoreView, CatalogError> {
        let categories = self
            .repo
            .categories_of_store(store.id)
            .await?
            .into_iter()
            .map(|c| c.store_cat_id)
            .collect();
        Ok(StoreView { store, categories })
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// Create or rename a store category. A random id is assigned when
    /// `store_cat_id` is `None`.
    ///
    /// # Errors
    ///
    /// `Forbidden` when renaming a category created by someone else.
    pub async fn upsert_store_category(
        &self,
        customer: &Customer,
        store_cat_id: Option<i64>,
        name: &str,
    ) -> Result<StoreCategory, CatalogError> {
        let name = required("name", name)?;
        let store_cat_id = positive_id("store_cat_id", store_cat_id)?;

        if let Some(existing) = self.repo.store_category(store_cat_id).await? {
            ensure_owner(&existing, customer)?;
        }

        Ok(self
            .repo
            .upsert_store_category(store_cat_id, &name, customer.id)
            .await?)
    }

    /// A store category with its stores.
    ///
    /// # Errors
    ///
    /// `NotFound` if the category does not exist.
    pub async fn store_category(&self, store_cat_id: i64) -> Result<StoreCategoryView, CatalogError> {
        let category = self.find_store_category(store_cat_id).await?;
        let stores = self.repo.stores_in_category(category.id).await?;
        Ok(StoreCategoryView { category, stores })
    }

    /// # Errors
    ///
    /// `NotFound`, `Forbidden` for someone else's category, `Conflict` while
    /// stores are attached.
    pub async fn delete_store_category(
        &self,
        customer: &Customer,
        store_cat_id: i64,
    ) -> Result<(), CatalogError> {
        let category = self.find_store_category(store_cat_id).await?;
        ensure_owner(&category, customer)?;

        if !self.repo.delete_store_category(category.id).await? {
            return Err(CatalogError::NotFound("Store category not found".to_owned()));
        }
        Ok(())
    }

    async fn find_store_category(&self, store_cat_id: i64) -> Result<StoreCategory, CatalogError> {
        self.repo
            .store_category(store_cat_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Store category not found".to_owned()))
    }

    /// Create or rename a product category.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty name or a non-positive id.
    pub async fn upsert_product_category(
        &self,
        prod_cat_id: Option<i64>,
        name: &str,
    ) -> Result<ProductCategory, CatalogError> {
        let name = required("name", name)?;
        let prod_cat_id = positive_id("prod_cat_id", prod_cat_id)?;
        Ok(self
            .repo
            .upsert_product_category(prod_cat_id, &name)
            .await?)
    }

    /// A product category with its products.
    ///
    /// # Errors
    ///
    /// `NotFound` if the category does not exist.
    pub async fn product_category(
        &self,
        prod_cat_id: i64,
    ) -> Result<ProductCategoryView, CatalogError> {
        let category = self.find_product_category(prod_cat_id).await?;
        let products = self.repo.products_in_category(category.id).await?;
        Ok(ProductCategoryView { category, products })
    }

    /// # Errors
    ///
    /// `NotFound`, or `Conflict` while products are attached.
    pub async fn delete_product_category(&self, prod_cat_id: i64) -> Result<(), CatalogError> {
        let category = self.find_product_category(prod_cat_id).await?;
        if !self.repo.delete_product_category(category.id).await? {
            return Err(CatalogError::NotFound(
                "Product category not found".to_owned(),
            ));
        }
        Ok(())
    }

    async fn find_product_category(
        &self,
        prod_cat_id: i64,
    ) -> Result<ProductCategory, CatalogError> {
        self.repo
            .product_category(prod_cat_id)
            .await?
            .ok_or_else(|| CatalogError::NotFound("Product category not found".to_owned()))
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Search by name or model; a blank query lists everything.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    pub async fn search_products(&self, query: Option<&str>) -> Result<Vec<Product>, CatalogError> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        Ok(self.repo.search_products(query).await?)
    }

    /// # Errors
    ///
    /// `NotFound` if no product has this stock number.
    pub async fn product(&self, stock_number: StockNumber) -> Result<Product, CatalogError> {
        self.repo
            .product_by_stock_number(stock_number)
            .await?
            .ok_or_else(|| CatalogError::NotFound(format!("Product {stock_number} not found")))
    }

    /// Remove a product from the caller's store.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `Forbidden` if the product belongs to another vendor.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn delete_product(
        &self,
        customer: &Customer,
        stock_number: StockNumber,
    ) -> Result<(), CatalogError> {
        let product = self.product(stock_number).await?;
        let store = self.repo.store_by_id(product.store_id).await?.ok_or_else(|| {
            CatalogError::Repository(RepositoryError::DataCorruption(format!(
                "product {stock_number} has no store"
            )))
        })?;
        ensure_owner(&store, customer)?;

        self.repo.delete_product(product.id).await?;
        tracing::info!(%stock_number, "Product deleted");
        Ok(())
    }

    /// Check that an import can be queued for the caller.
    ///
    /// # Errors
    ///
    /// `FailedPrecondition` if the caller has no store; `Validation` for an
    /// empty record list.
    pub async fn ensure_can_import(
        &self,
        customer: &Customer,
        products: &[ProductImport],
    ) -> Result<Store, CatalogError> {
        if products.is_empty() {
            return Err(CatalogError::Validation("No products to import".to_owned()));
        }
        self.ensure_has_store(customer).await
    }

    /// # Errors
    ///
    /// `FailedPrecondition` if the caller has no store.
    pub async fn ensure_has_store(&self, customer: &Customer) -> Result<Store, CatalogError> {
        self.repo
            .store_by_owner(customer.id)
            .await?
            .ok_or_else(|| CatalogError::FailedPrecondition("Please create a store first".to_owned()))
    }

    /// Upsert `records` into `store`, collecting per-record failures instead
    /// of aborting.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    #[instrument(skip(self, store, records), fields(store_id = %store.id, records = records.len()))]
    pub async fn import_products(
        &self,
        store: &Store,
        records: &[ProductImport],
    ) -> Result<ImportReport, CatalogError> {
        let mut report = ImportReport::default();

        for record in records {
            match self.import_one(store, record).await {
                Ok(()) => report.imported += 1,
                Err(
                    CatalogError::Validation(reason)
                    | CatalogError::NotFound(reason)
                    | CatalogError::Conflict(reason),
                ) => {
                    report
                        .rejected
                        .push(format!("{}: {reason}", record.stock_number));
                }
                Err(other) => return Err(other),
            }
        }

        Ok(report)
    }

    async fn import_one(&self, store: &Store, record: &ProductImport) -> Result<(), CatalogError> {
        let name = required("name", &record.name)?;
        non_negative("price", record.price)?;
        non_negative("recommended_price", record.recommended_price)?;
        if record.weight_class < 1 {
            return Err(CatalogError::Validation(
                "weight_class must be at least 1".to_owned(),
            ));
        }
        if record.amount < 0 {
            return Err(CatalogError::Validation("amount must not be negative".to_owned()));
        }

        let category_id = match record.category {
            Some(prod_cat_id) => Some(self.find_product_category(prod_cat_id).await?.id),
            None => None,
        };

        self.repo
            .upsert_product(&ProductUpsert {
                stock_number: record.stock_number,
                name,
                model: record.model.clone(),
                store_id: store.id,
                category_id,
                price: record.price,
                recommended_price: record.recommended_price,
                weight_class: record.weight_class,
                amount: record.amount,
                description: record.description.clone(),
            })
            .await?;
        Ok(())
    }

    /// The store's products as pretty-printed JSON import records.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on storage failure.
    pub async fn export_listing(&self, store: &Store) -> Result<(usize, String), CatalogError> {
        let records: Vec<ProductImport> = self
            .repo
            .products_by_store(store.id)
            .await?
            .into_iter()
            .map(|p| ProductImport {
                stock_number: p.stock_number,
                name: p.name,
                model: p.model,
                price: p.price,
                recommended_price: p.recommended_price,
                weight_class: p.weight_class,
                amount: p.amount,
                description: p.description,
                category: p.prod_cat_id,
            })
            .collect();

        let listing = serde_json::to_string_pretty(&records).map_err(|e| {
            CatalogError::Repository(RepositoryError::DataCorruption(e.to_string()))
        })?;
        Ok((records.len(), listing))
    }
}

fn required(field: &str, value: &str) -> Result<String, CatalogError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::Validation(format!("{field} must not be empty")));
    }
    Ok(value.to_owned())
}

fn non_negative(field: &str, value: Money) -> Result<(), CatalogError> {
    if value.is_negative() {
        return Err(CatalogError::Validation(format!("{field} must not be negative")));
    }
    Ok(())
}

fn positive_id(field: &str, id: Option<i64>) -> Result<i64, CatalogError> {
    match id {
        Some(id) if id <= 0 => Err(CatalogError::Validation(format!("{field} must be positive"))),
        Some(id) => Ok(id),
        None => Ok(rand::rng().random_range(GENERATED_CATEGORY_IDS)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marketplace_core::Email;

    use super::*;
    use crate::db::{CustomerRepository, MemoryRepository};
    use crate::models::NewCustomer;

    async fn customer(repo: &MemoryRepository, email: &str, vendor_id: Option<i64>) -> Customer {
        repo.create_customer(&NewCustomer {
            email: Email::parse(email).unwrap(),
            password_hash: "x".to_owned(),
            user_name: email.to_owned(),
            first_name: "First".to_owned(),
            last_name: "Last".to_owned(),
            phone_number: "+1000".to_owned(),
            organization: None,
            address: None,
            area_code: 1,
            is_vendor: vendor_id.is_some(),
            seller_vendor_id: vendor_id,
        })
        .await
        .unwrap()
    }

    fn store_input(store_cat_id: i64) -> StoreInput {
        StoreInput {
            name: "Hammers".to_owned(),
            address: "2 Side St".to_owned(),
            url: None,
            store_cat_id,
            nominal_delivery_price: Money::from_units(10),
            status: None,
        }
    }

    fn record(stock: i64, name: &str) -> ProductImport {
        ProductImport {
            stock_number: StockNumber::new(stock).unwrap(),
            name: name.to_owned(),
            model: None,
            price: Money::from_units(100),
            recommended_price: Money::from_units(110),
            weight_class: 2,
            amount: 3,
            description: None,
            category: None,
        }
    }

    #[tokio::test]
    async fn buyers_cannot_open_stores() {
        let repo = MemoryRepository::new();
        let buyer = customer(&repo, "buyer@example.com", None).await;
        let catalog = CatalogService::new(&repo);

        let err = catalog.create_store(&buyer, store_input(10)).await.unwrap_err();
        assert!(
            matches!(err, CatalogError::FailedPrecondition(msg) if msg == "You are not registered as a vendor")
        );
    }

    #[tokio::test]
    async fn store_needs_existing_category() {
        let repo = MemoryRepository::new();
        let vendor = customer(&repo, "v@example.com", Some(500)).await;
        let catalog = CatalogService::new(&repo);

        let err = catalog.create_store(&vendor, store_input(10)).await.unwrap_err();
        assert!(matches!(err, CatalogError::FailedPrecondition(_)));

        catalog
            .upsert_store_category(&vendor, Some(10), "Tools")
            .await
            .unwrap();
        let view = catalog.create_store(&vendor, store_input(10)).await.unwrap();
        assert_eq!(view.categories, vec![10]);
        assert!(view.store.status);

        let err = catalog.create_store(&vendor, store_input(10)).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_creator_renames_or_deletes_category() {
        let repo = MemoryRepository::new();
        let vendor = customer(&repo, "v@example.com", Some(500)).await;
        let other = customer(&repo, "o@example.com", Some(501)).await;
        let catalog = CatalogService::new(&repo);

        catalog
            .upsert_store_category(&vendor, Some(10), "Tools")
            .await
            .unwrap();

        let err = catalog
            .upsert_store_category(&other, Some(10), "Mine")
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Access(AccessError::Forbidden(_))));

        let err = catalog.delete_store_category(&other, 10).await.unwrap_err();
        assert!(matches!(err, CatalogError::Access(AccessError::Forbidden(_))));

        catalog.create_store(&vendor, store_input(10)).await.unwrap();
        let err = catalog.delete_store_category(&vendor, 10).await.unwrap_err();
        assert!(matches!(err, CatalogError::Conflict(_)));
    }

    #[tokio::test]
    async fn generated_category_id_is_in_range() {
        let repo = MemoryRepository::new();
        let vendor = customer(&repo, "v@example.com", Some(500)).await;
        let category = CatalogService::new(&repo)
            .upsert_store_category(&vendor, None, "Tools")
            .await
            .unwrap();
        assert!(GENERATED_CATEGORY_IDS.contains(&category.store_cat_id));
    }

    #[tokio::test]
    async fn import_upserts_and_reports_rejections() {
        let repo = MemoryRepository::new();
        let vendor = customer(&repo, "v@example.com", Some(500)).await;
        let catalog = CatalogService::new(&repo);
        catalog
            .upsert_store_category(&vendor, Some(10), "Tools")
            .await
            .unwrap();
        let store = catalog.create_store(&vendor, store_input(10)).await.unwrap().store;

        let mut bad = record(17, "Broken");
        bad.weight_class = 0;
        let mut unknown_category = record(18, "Orphan");
        unknown_category.category = Some(999);

        let report = catalog
            .import_products(&store, &[record(15, "Hammer"), bad, unknown_category])
            .await
            .unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.rejected.len(), 2);
        assert!(report.rejected[0].starts_with("17: "));

        let report = catalog
            .import_products(&store, &[record(15, "Sledgehammer")])
            .await
            .unwrap();
        assert_eq!(report.imported, 1);
        let product = catalog.product(StockNumber::new(15).unwrap()).await.unwrap();
        assert_eq!(product.name, "Sledgehammer");
        assert_eq!(product.slug, "15");

        let (count, listing) = catalog.export_listing(&store).await.unwrap();
        assert_eq!(count, 1);
        assert!(listing.contains("Sledgehammer"));
    }

    #[tokio::test]
    async fn only_the_vendor_deletes_a_product_and_store_waits_for_empty_catalog() {
        let repo = MemoryRepository::new();
        let vendor = customer(&repo, "v@example.com", Some(500)).await;
        let other = customer(&repo, "o@example.com", None).await;
        let catalog = CatalogService::new(&repo);
        catalog
            .upsert_store_category(&vendor, Some(10), "Tools")
            .await
            .unwrap();
        let store = catalog.create_store(&vendor, store_input(10)).await.unwrap().store;
        catalog
            .import_products(&store, &[record(15, "Hammer")])
            .await
            .unwrap();
        let stock = StockNumber::new(15).unwrap();

        let err = catalog.delete_store(&vendor).await.unwrap_err();
        assert!(
            matches!(err, CatalogError::Conflict(msg) if msg.contains("still lists products"))
        );
        assert!(catalog.own_store(&vendor).await.is_ok());

        let err = catalog.delete_product(&other, stock).await.unwrap_err();
        assert!(matches!(err, CatalogError::Access(AccessError::Forbidden(_))));

        catalog.delete_product(&vendor, stock).await.unwrap();
        catalog.delete_store(&vendor).await.unwrap();
        assert!(matches!(
            catalog.own_store(&vendor).await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn search_matches_name_or_model_case_insensitively() {
        let repo = MemoryRepository::new();
        let vendor = customer(&repo, "v@example.com", Some(500)).await;
        let catalog = CatalogService::new(&repo);
        catalog
            .upsert_store_category(&vendor, Some(10), "Tools")
            .await
            .unwrap();
        let store = catalog.create_store(&vendor, store_input(10)).await.unwrap().store;
        let mut drill = record(16, "Cordless drill");
        drill.model = Some("HAM-3".to_owned());
        catalog
            .import_products(&store, &[record(15, "Claw Hammer"), drill, record(17, "Saw")])
            .await
            .unwrap();

        let found = catalog.search_products(Some("ham")).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(catalog.search_products(Some("  ")).await.unwrap().len(), 3);
    }
}
