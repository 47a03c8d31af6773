//! Store, category and product route handlers.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use marketplace_core::{Money, StockNumber, StoreId};

use crate::error::{ApiJson, AppError, Result};
use crate::middleware::RequireCustomer;
use crate::models::{
    Product, ProductCategory, ProductCategoryView, ProductImport, StoreCategory,
    StoreCategoryView, StoreUpdate, StoreView,
};
use crate::routes::Message;
use crate::services::catalog::{CatalogService, StoreInput};
use crate::services::jobs::Job;
use crate::state::AppState;

/// Parse a path segment, answering `404` for values that cannot name anything.
fn parse_path<T: FromStr>(raw: &str, what: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::NotFound(format!("{what} not found")))
}

// =============================================================================
// Stores
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub url: Option<String>,
    pub store_cat_id: i64,
    pub nominal_delivery_price: Money,
    #[serde(default)]
    pub status: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStoreRequest {
    pub name: Option<String>,
    pub address: Option<String>,
    pub url: Option<String>,
    pub nominal_delivery_price: Option<Money>,
    pub status: Option<bool>,
    /// Add the store to this category.
    pub store_cat_id: Option<i64>,
}

/// POST /api/v1/store
#[instrument(skip_all)]
pub async fn create_store(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<CreateStoreRequest>,
) -> Result<(StatusCode, Json<StoreView>)> {
    let store = CatalogService::new(state.repo())
        .create_store(
            &customer,
            StoreInput {
                name: req.name,
                address: req.address,
                url: req.url,
                store_cat_id: req.store_cat_id,
                nominal_delivery_price: req.nominal_delivery_price,
                status: req.status,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(store)))
}

/// GET /api/v1/store
pub async fn own_store(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<StoreView>> {
    Ok(Json(
        CatalogService::new(state.repo()).own_store(&customer).await?,
    ))
}

/// PATCH /api/v1/store
pub async fn update_store(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<UpdateStoreRequest>,
) -> Result<Json<StoreView>> {
    let update = StoreUpdate {
        name: req.name,
        address: req.address,
        url: req.url,
        nominal_delivery_price: req.nominal_delivery_price,
        status: req.status,
    };
    let store = CatalogService::new(state.repo())
        .update_store(&customer, update, req.store_cat_id)
        .await?;
    Ok(Json(store))
}

/// DELETE /api/v1/store
pub async fn delete_store(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Message>> {
    CatalogService::new(state.repo())
        .delete_store(&customer)
        .await?;
    Ok(Message::new("This store has been deleted"))
}

/// GET /api/v1/store/{id}
pub async fn show_store(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoreView>> {
    let id: StoreId = parse_path(&id, "Store")?;
    Ok(Json(CatalogService::new(state.repo()).store(id).await?))
}

// =============================================================================
// Categories
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StoreCategoryRequest {
    #[serde(default)]
    pub store_cat_id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductCategoryRequest {
    #[serde(default)]
    pub prod_cat_id: Option<i64>,
    pub name: String,
}

/// POST /api/v1/store-cat
pub async fn upsert_store_category(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<StoreCategoryRequest>,
) -> Result<Json<StoreCategory>> {
    let category = CatalogService::new(state.repo())
        .upsert_store_category(&customer, req.store_cat_id, &req.name)
        .await?;
    Ok(Json(category))
}

/// GET /api/v1/store-cat/{id}
pub async fn show_store_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoreCategoryView>> {
    let id: i64 = parse_path(&id, "Store category")?;
    Ok(Json(
        CatalogService::new(state.repo()).store_category(id).await?,
    ))
}

/// DELETE /api/v1/store-cat/{id}
pub async fn delete_store_category(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let id: i64 = parse_path(&id, "Store category")?;
    CatalogService::new(state.repo())
        .delete_store_category(&customer, id)
        .await?;
    Ok(Message::new("Store category deleted"))
}

/// POST /api/v1/prod-cat
pub async fn upsert_product_category(
    State(state): State<AppState>,
    RequireCustomer(_customer): RequireCustomer,
    ApiJson(req): ApiJson<ProductCategoryRequest>,
) -> Result<Json<ProductCategory>> {
    let category = CatalogService::new(state.repo())
        .upsert_product_category(req.prod_cat_id, &req.name)
        .await?;
    Ok(Json(category))
}

/// GET /api/v1/prod-cat/{id}
pub async fn show_product_category(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProductCategoryView>> {
    let id: i64 = parse_path(&id, "Product category")?;
    Ok(Json(
        CatalogService::new(state.repo())
            .product_category(id)
            .await?,
    ))
}

/// DELETE /api/v1/prod-cat/{id}
pub async fn delete_product_category(
    State(state): State<AppState>,
    RequireCustomer(_customer): RequireCustomer,
    Path(id): Path<String>,
) -> Result<Json<Message>> {
    let id: i64 = parse_path(&id, "Product category")?;
    CatalogService::new(state.repo())
        .delete_product_category(id)
        .await?;
    Ok(Message::new("Product category deleted"))
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Substring of the product name or model.
    pub s: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub products: Vec<ProductImport>,
}

/// GET /api/v1/goods?s=
pub async fn search_products(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = CatalogService::new(state.repo())
        .search_products(query.s.as_deref())
        .await?;
    Ok(Json(products))
}

/// GET /api/v1/goods/{slug}
pub async fn show_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Product>> {
    let stock_number: StockNumber = parse_path(&slug, "Product")?;
    Ok(Json(
        CatalogService::new(state.repo())
            .product(stock_number)
            .await?,
    ))
}

/// DELETE /api/v1/goods/{slug}
pub async fn delete_product(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    Path(slug): Path<String>,
) -> Result<Json<Message>> {
    let stock_number: StockNumber = parse_path(&slug, "Product")?;
    CatalogService::new(state.repo())
        .delete_product(&customer, stock_number)
        .await?;
    Ok(Message::new(format!("Product {stock_number} deleted")))
}

/// POST /api/v1/goods-import
///
/// Checks run synchronously; the upserts happen on the job worker, which
/// emails a summary.
#[instrument(skip_all)]
pub async fn import_products(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
    ApiJson(req): ApiJson<ImportRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    CatalogService::new(state.repo())
        .ensure_can_import(&customer, &req.products)
        .await?;
    tracing::info!(records = req.products.len(), "Queueing product import");
    state.jobs().enqueue(Job::ImportProducts {
        customer: customer.id,
        products: req.products,
    })?;
    Ok((
        StatusCode::ACCEPTED,
        Message::new("Import queued, a summary will be sent to your email"),
    ))
}

/// GET /api/v1/product-export
pub async fn export_products(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<(StatusCode, Json<Message>)> {
    CatalogService::new(state.repo())
        .ensure_has_store(&customer)
        .await?;
    state.jobs().enqueue(Job::ExportProducts {
        customer: customer.id,
    })?;
    Ok((
        StatusCode::ACCEPTED,
        Message::new("Details will be sent to your email"),
    ))
}
