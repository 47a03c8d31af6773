//! HTTP route handlers for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                              - Liveness
//! GET  /health/ready                        - Readiness (database ping)
//!
//! # Accounts (/api/v1)
//! POST   /user-signup                       - Register (rate limited)
//! GET    /email-activation/{uid}/{token}    - Confirm email
//! POST   /login                             - Issue bearer token (rate limited)
//! POST   /logout                            - Revoke bearer token
//! GET    /customers                         - Own profile
//! PATCH  /customers                         - Edit own profile
//! DELETE /customers                         - Delete own account
//!
//! # Catalog
//! POST/GET/PATCH/DELETE /store              - Own store
//! GET    /store/{id}                        - Any store
//! POST   /store-cat                         - Create or rename store category
//! GET    /store-cat/{id}                    - Store category with its stores
//! DELETE /store-cat/{id}                    - Delete own store category
//! POST   /prod-cat                          - Create or rename product category
//! GET    /prod-cat/{id}                     - Product category with its products
//! DELETE /prod-cat/{id}                     - Delete empty product category
//! GET    /goods?s=                          - Search products
//! GET    /goods/{slug}                      - Product detail
//! DELETE /goods/{slug}                      - Delete own product
//! POST   /goods-import                      - Queue vendor import (202)
//! GET    /product-export                    - Queue vendor export (202)
//!
//! # Basket and orders
//! GET/POST/DELETE /basket
//! POST   /order                             - Place order from basket
//! GET    /order                             - Own orders
//! DELETE /order                             - Delete own early-stage order
//! GET    /order-detail/{order_slug}         - Order with items
//! ```

pub mod account;
pub mod auth;
pub mod basket;
pub mod catalog;
pub mod orders;

use axum::{
    Json, Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::middleware::{auth_rate_limiter, rate_limit_json};
use crate::state::AppState;

/// Success acknowledgement without a resource body.
#[derive(Debug, Serialize)]
pub struct Message {
    pub status: bool,
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            status: true,
            message: message.into(),
        })
    }
}

/// Signup and login, behind the per-IP limiter.
fn rate_limited_routes() -> Router<AppState> {
    Router::new()
        .route("/user-signup", post(auth::signup))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
        .layer(axum::middleware::map_response(rate_limit_json))
}

fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/email-activation/{uid}/{token}",
            get(auth::activate_email),
        )
        .route("/logout", post(auth::logout))
        .route(
            "/customers",
            get(account::show)
                .patch(account::update)
                .delete(account::delete),
        )
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/store",
            post(catalog::create_store)
                .get(catalog::own_store)
                .patch(catalog::update_store)
                .delete(catalog::delete_store),
        )
        .route("/store/{id}", get(catalog::show_store))
        .route("/store-cat", post(catalog::upsert_store_category))
        .route(
            "/store-cat/{id}",
            get(catalog::show_store_category).delete(catalog::delete_store_category),
        )
        .route("/prod-cat", post(catalog::upsert_product_category))
        .route(
            "/prod-cat/{id}",
            get(catalog::show_product_category).delete(catalog::delete_product_category),
        )
        .route("/goods", get(catalog::search_products))
        .route(
            "/goods/{slug}",
            get(catalog::show_product).delete(catalog::delete_product),
        )
        .route("/goods-import", post(catalog::import_products))
        .route("/product-export", get(catalog::export_products))
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/basket",
            get(basket::list).post(basket::add).delete(basket::remove),
        )
        .route(
            "/order",
            post(orders::place).get(orders::list).delete(orders::delete),
        )
        .route("/order-detail/{order_slug}", get(orders::show))
}

/// All `/api/v1` routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(rate_limited_routes())
        .merge(account_routes())
        .merge(catalog_routes())
        .merge(order_routes())
}

/// Create all routes for the marketplace.
pub fn routes() -> Router<AppState> {
    Router::new().nest("/api/v1", api_routes())
}
