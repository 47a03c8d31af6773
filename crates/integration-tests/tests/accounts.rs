//! Signup, activation, login and profile endpoints.
//!
//! Run with: cargo test -p marketplace-integration-tests

#![allow(clippy::unwrap_used)]

use axum::http::{Method, StatusCode};
use marketplace_integration_tests::{PASSWORD, TestApp, activation_path};
use serde_json::json;

fn signup_body(email: &str) -> serde_json::Value {
    json!({
        "email": email,
        "password": PASSWORD,
        "user_name": "jo",
        "first_name": "Jo",
        "last_name": "March",
        "phone_number": "+15550101",
        "area_code": 3,
    })
}

#[tokio::test]
async fn health_endpoints() {
    let app = TestApp::new();
    let live = app.get("/health", None).await;
    assert_eq!(live.status, StatusCode::OK);
    assert_eq!(live.body, "ok");

    let ready = app.get("/health/ready", None).await;
    assert_eq!(ready.status, StatusCode::OK);
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = TestApp::new();

    let missing = app.get("/api/v1/customers", None).await;
    assert_eq!(missing.status, StatusCode::UNAUTHORIZED);
    assert_eq!(missing.str("code"), "unauthenticated");
    assert_eq!(missing.body["status"], false);

    let forged = app.get("/api/v1/basket", Some("not-a-real-token")).await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_requires_activation() {
    let app = TestApp::new();
    let signup = app
        .post("/api/v1/user-signup", None, signup_body("jo@example.com"))
        .await;
    assert_eq!(signup.status, StatusCode::CREATED, "{}", signup.body);
    assert!(signup.body.get("password_hash").is_none());

    let login = app
        .post(
            "/api/v1/login",
            None,
            json!({ "email": "jo@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::FORBIDDEN);

    let activation = app.email("jo@example.com", "Activation email").await;
    let path = activation_path(&activation.body).to_owned();
    assert_eq!(app.get(&path, None).await.status, StatusCode::OK);
    // The link is single-use.
    assert_eq!(app.get(&path, None).await.status, StatusCode::NOT_FOUND);

    let wrong = app
        .post(
            "/api/v1/login",
            None,
            json!({ "email": "jo@example.com", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let login = app
        .post(
            "/api/v1/login",
            None,
            json!({ "email": "jo@example.com", "password": PASSWORD }),
        )
        .await;
    assert_eq!(login.status, StatusCode::OK);
    assert_eq!(login.body["status"], true);
}

#[tokio::test]
async fn duplicate_and_invalid_signups() {
    let app = TestApp::new();
    let ip = app.fresh_ip();
    let first = app
        .request_from(
            &ip,
            Method::POST,
            "/api/v1/user-signup",
            None,
            Some(signup_body("meg@example.com")),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED);

    let again = app
        .request_from(
            &ip,
            Method::POST,
            "/api/v1/user-signup",
            None,
            Some(signup_body("meg@example.com")),
        )
        .await;
    assert_eq!(again.status, StatusCode::NOT_ACCEPTABLE);

    let mut weak = signup_body("beth@example.com");
    weak["password"] = json!("12345678");
    let weak = app
        .request_from(&ip, Method::POST, "/api/v1/user-signup", None, Some(weak))
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(weak.str("code"), "validation_error");
}

#[tokio::test]
async fn logout_revokes_the_token() {
    let app = TestApp::new();
    let token = app.register("amy@example.com", false, None).await;

    let me = app.get("/api/v1/customers", Some(&token)).await;
    assert_eq!(me.str("email"), "amy@example.com");

    let logout = app
        .post("/api/v1/logout", Some(&token), json!({}))
        .await;
    assert_eq!(logout.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/v1/customers", Some(&token)).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn profile_update_and_delete() {
    let app = TestApp::new();
    let token = app.register("lau@example.com", false, None).await;

    let updated = app
        .request(
            Method::PATCH,
            "/api/v1/customers",
            Some(&token),
            Some(json!({ "first_name": "Laurie", "address": "4 Orchard House" })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK, "{}", updated.body);
    assert_eq!(updated.str("first_name"), "Laurie");
    assert_eq!(updated.str("address"), "4 Orchard House");

    let bad = app
        .request(
            Method::PATCH,
            "/api/v1/customers",
            Some(&token),
            Some(json!({ "area_code": 0 })),
        )
        .await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);

    let deleted = app.delete("/api/v1/customers", Some(&token), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(
        app.get("/api/v1/customers", Some(&token)).await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn login_is_rate_limited_per_client() {
    let app = TestApp::new();
    let body = json!({ "email": "nobody@example.com", "password": PASSWORD });

    for _ in 0..5 {
        let resp = app
            .request_from("198.51.100.7", Method::POST, "/api/v1/login", None, Some(body.clone()))
            .await;
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
    }

    let limited = app
        .request_from("198.51.100.7", Method::POST, "/api/v1/login", None, Some(body.clone()))
        .await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.str("code"), "rate_limited");

    // Other clients are unaffected.
    let other = app
        .request_from("198.51.100.8", Method::POST, "/api/v1/login", None, Some(body))
        .await;
    assert_eq!(other.status, StatusCode::NOT_FOUND);
}
