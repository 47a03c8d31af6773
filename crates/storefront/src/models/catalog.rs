//! Stores, categories and products.

use serde::{Deserialize, Serialize};

use marketplace_core::{
    CustomerId, Money, ProductCategoryId, ProductId, StockNumber, StoreCategoryId, StoreId,
};

/// A vendor's store. Each vendor owns at most one.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Store {
    pub id: StoreId,
    pub owner_id: CustomerId,
    pub name: String,
    pub address: String,
    pub url: Option<String>,
    /// Vendor's delivery rate, the base of the order delivery price.
    pub nominal_delivery_price: Money,
    /// Inactive stores do not fulfil basket additions.
    pub status: bool,
}

#[derive(Debug, Clone)]
pub struct NewStore {
    pub owner_id: CustomerId,
    pub name: String,
    pub address: String,
    pub url: Option<String>,
    pub nominal_delivery_price: Money,
    pub status: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StoreUpdate {
    pub name: Option<String>,
    pub address: Option<String>,
    pub url: Option<String>,
    pub nominal_delivery_price: Option<Money>,
    pub status: Option<bool>,
}

/// A store together with the external ids of its categories.
#[derive(Debug, Clone, Serialize)]
pub struct StoreView {
    #[serde(flatten)]
    pub store: Store,
    pub categories: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreCategory {
    #[serde(skip)]
    pub id: StoreCategoryId,
    pub store_cat_id: i64,
    pub name: String,
    /// Customer who created the category; cleared when that account is deleted.
    #[serde(skip)]
    pub created_by: Option<CustomerId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoreCategoryView {
    #[serde(flatten)]
    pub category: StoreCategory,
    pub stores: Vec<Store>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductCategory {
    #[serde(skip)]
    pub id: ProductCategoryId,
    pub prod_cat_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductCategoryView {
    #[serde(flatten)]
    pub category: ProductCategory,
    pub products: Vec<Product>,
}

/// A catalog product, fulfilled by a single store.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    #[serde(skip)]
    pub id: ProductId,
    pub stock_number: StockNumber,
    pub slug: String,
    pub name: String,
    pub model: Option<String>,
    #[serde(rename = "delivery_store")]
    pub store_id: StoreId,
    #[serde(skip)]
    pub category_id: Option<ProductCategoryId>,
    /// External id of the product category, if any.
    #[serde(rename = "product_cat")]
    pub prod_cat_id: Option<i64>,
    pub price: Money,
    pub recommended_price: Money,
    pub weight_class: i32,
    /// Units in stock.
    pub amount: i32,
    pub description: Option<String>,
}

/// Insert-or-update of a product keyed by stock number.
#[derive(Debug, Clone)]
pub struct ProductUpsert {
    pub stock_number: StockNumber,
    pub name: String,
    pub model: Option<String>,
    pub store_id: StoreId,
    pub category_id: Option<ProductCategoryId>,
    pub price: Money,
    pub recommended_price: Money,
    pub weight_class: i32,
    pub amount: i32,
    pub description: Option<String>,
}

/// One record of a vendor import file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductImport {
    pub stock_number: StockNumber,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    pub price: Money,
    pub recommended_price: Money,
    pub weight_class: i32,
    pub amount: i32,
    #[serde(default)]
    pub description: Option<String>,
    /// External product category id.
    #[serde(default)]
    pub category: Option<i64>,
}
