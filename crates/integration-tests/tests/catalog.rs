//! Stores, categories and products over HTTP.
//!
//! Run with: cargo test -p marketplace-integration-tests

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use marketplace_integration_tests::TestApp;
use serde_json::json;

#[tokio::test]
async fn vendor_imports_and_buyers_search() {
    let app = TestApp::new();
    let vendor = app
        .vendor("shop@example.com", 10, "5", &[(101, "20", 1), (102, "35", 2)])
        .await;

    let own = app.get("/api/v1/store", Some(&vendor)).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["categories"], json!([10]));
    let store_id = own.body["id"].as_i64().unwrap();

    let public = app.get(&format!("/api/v1/store/{store_id}"), None).await;
    assert_eq!(public.status, StatusCode::OK);

    let found = app.get("/api/v1/goods?s=item", None).await;
    assert_eq!(found.body.as_array().unwrap().len(), 2);

    let product = app.get("/api/v1/goods/101", None).await;
    assert_eq!(product.status, StatusCode::OK);
    assert_eq!(product.str("name"), "Item 101");
    assert_eq!(product.body["delivery_store"], store_id);

    let category = app.get("/api/v1/store-cat/10", None).await;
    assert_eq!(category.status, StatusCode::OK);
}

#[tokio::test]
async fn only_vendors_open_stores() {
    let app = TestApp::new();
    let buyer = app.register("buyer@example.com", false, None).await;
    app.post(
        "/api/v1/store-cat",
        Some(&buyer),
        json!({ "store_cat_id": 3, "name": "Garden" }),
    )
    .await;

    let resp = app
        .post(
            "/api/v1/store",
            Some(&buyer),
            json!({
                "name": "Nope",
                "address": "Nowhere",
                "store_cat_id": 3,
                "nominal_delivery_price": "1",
            }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.str("code"), "failed_precondition");
}

#[tokio::test]
async fn vendors_manage_only_their_own_products() {
    let app = TestApp::new();
    let first = app
        .vendor("first@example.com", 20, "4", &[(201, "10", 1)])
        .await;
    let second = app
        .vendor("second@example.com", 21, "4", &[(202, "10", 1)])
        .await;

    let foreign = app.delete("/api/v1/goods/201", Some(&second), None).await;
    assert_eq!(foreign.status, StatusCode::FORBIDDEN);

    // A store with listings cannot be removed.
    let busy = app.delete("/api/v1/store", Some(&first), None).await;
    assert_eq!(busy.status, StatusCode::NOT_ACCEPTABLE);

    let own = app.delete("/api/v1/goods/201", Some(&first), None).await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/v1/goods/201", None).await.status,
        StatusCode::NOT_FOUND
    );

    let empty = app.delete("/api/v1/store", Some(&first), None).await;
    assert_eq!(empty.status, StatusCode::OK);
}

#[tokio::test]
async fn inactive_store_stops_basket_additions() {
    let app = TestApp::new();
    let vendor = app
        .vendor("closed@example.com", 30, "2", &[(301, "15", 1)])
        .await;
    let closed = app
        .request(
            Method::PATCH,
            "/api/v1/store",
            Some(&vendor),
            Some(json!({ "status": false })),
        )
        .await;
    assert_eq!(closed.status, StatusCode::OK, "{}", closed.body);

    let buyer = app.register("late@example.com", false, Some("1 Road")).await;
    let resp = app
        .post(
            "/api/v1/basket",
            Some(&buyer),
            json!({ "stock_number": 301, "quantity": 1 }),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_is_mailed_to_the_vendor() {
    let app = TestApp::new();
    let vendor = app
        .vendor("export@example.com", 40, "3", &[(401, "12", 1)])
        .await;

    let resp = app.get("/api/v1/product-export", Some(&vendor)).await;
    assert_eq!(resp.status, StatusCode::ACCEPTED);
    assert_eq!(resp.str("message"), "Details will be sent to your email");

    let email = app.email("export@example.com", "Product export").await;
    assert!(email.body.contains("Item 401"));
}
