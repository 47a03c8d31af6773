//! End-to-end test harness for the marketplace API.
//!
//! The full router runs in-process over [`MemoryRepository`], with the job
//! worker delivering into a [`RecordingMailer`]. No database or network is
//! needed:
//!
//! ```bash
//! cargo test -p marketplace-integration-tests
//! ```
//!
//! Every request carries an `X-Forwarded-For` address so the per-IP rate
//! limiter has a key to work with.

#![allow(clippy::missing_panics_doc)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::ServiceExt;

use marketplace_core::TotalPricing;
use marketplace_storefront::config::MarketplaceConfig;
use marketplace_storefront::db::{MemoryRepository, Repository};
use marketplace_storefront::services::email::{EmailError, Mailer, OutgoingEmail};
use marketplace_storefront::services::jobs::{JobQueue, run_worker};
use marketplace_storefront::state::AppState;

pub const BASE_URL: &str = "http://localhost:3000";
pub const PASSWORD: &str = "correct-horse-42";

/// Keeps every delivered message for inspection.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), EmailError> {
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

impl RecordingMailer {
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }
}

/// Status and parsed JSON body of one response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    /// String field of the body, panicking with the whole body if absent.
    pub fn str(&self, field: &str) -> &str {
        self.body[field]
            .as_str()
            .unwrap_or_else(|| panic!("missing string field {field:?} in {}", self.body))
    }
}

/// A running application plus handles on its storage and outbox.
pub struct TestApp {
    router: Router,
    pub repo: MemoryRepository,
    pub mailer: Arc<RecordingMailer>,
    next_client: AtomicU8,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_pricing(TotalPricing::Unit)
    }

    pub fn with_pricing(total_pricing: TotalPricing) -> Self {
        let config = MarketplaceConfig {
            database_url: SecretString::from("postgres://localhost/marketplace_test"),
            host: std::net::IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: BASE_URL.to_owned(),
            session_secret: SecretString::from("integration-secret-Zq8vR2mK5wT9xB4nL7pC"),
            total_pricing,
            job_queue_capacity: 64,
            email: None,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        };

        let repo = MemoryRepository::new();
        let mailer = Arc::new(RecordingMailer::default());
        let (jobs, rx) = JobQueue::new(config.job_queue_capacity);
        let shared: Arc<dyn Repository> = Arc::new(repo.clone());
        tokio::spawn(run_worker(
            rx,
            Arc::clone(&shared),
            Arc::clone(&mailer) as Arc<dyn Mailer>,
        ));

        let router = marketplace_storefront::app(AppState::new(config, shared, jobs));
        Self {
            router,
            repo,
            mailer,
            next_client: AtomicU8::new(1),
        }
    }

    /// A client address not used by any earlier call on this app.
    pub fn fresh_ip(&self) -> String {
        format!("10.0.0.{}", self.next_client.fetch_add(1, Ordering::Relaxed))
    }

    pub async fn request_from(
        &self,
        ip: &str,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", ip);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("readable body");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

        TestResponse { status, body }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        self.request_from("192.0.2.1", method, uri, token, body)
            .await
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        self.request(Method::DELETE, uri, token, body).await
    }

    /// Wait for the worker to deliver a message to `to` with `subject`.
    pub async fn email(&self, to: &str, subject: &str) -> OutgoingEmail {
        for _ in 0..200 {
            let found = self
                .mailer
                .sent()
                .await
                .into_iter()
                .rev()
                .find(|e| e.to == to && e.subject == subject);
            if let Some(email) = found {
                return email;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no {subject:?} email for {to}");
    }

    /// Sign up, follow the activation link and log in; returns the bearer token.
    pub async fn register(&self, email: &str, is_vendor: bool, address: Option<&str>) -> String {
        let ip = self.fresh_ip();
        let signup = self
            .request_from(
                &ip,
                Method::POST,
                "/api/v1/user-signup",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": PASSWORD,
                    "user_name": email.split('@').next().unwrap_or(email),
                    "first_name": "Test",
                    "last_name": "Customer",
                    "phone_number": "+15550100",
                    "address": address,
                    "area_code": 1,
                    "is_vendor": is_vendor,
                })),
            )
            .await;
        assert_eq!(signup.status, StatusCode::CREATED, "{}", signup.body);

        let activation = self.email(email, "Activation email").await;
        let path = activation_path(&activation.body);
        let activated = self.get(path, None).await;
        assert_eq!(activated.status, StatusCode::OK, "{}", activated.body);

        let login = self
            .request_from(
                &ip,
                Method::POST,
                "/api/v1/login",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(login.status, StatusCode::OK, "{}", login.body);
        login.str("token").to_owned()
    }

    /// Register a vendor with a store at `rate` and import `products` as
    /// `(stock_number, price, weight_class)`; returns the vendor's token.
    pub async fn vendor(
        &self,
        email: &str,
        store_cat_id: i64,
        rate: &str,
        products: &[(i64, &str, i32)],
    ) -> String {
        let token = self.register(email, true, Some("1 Depot Rd")).await;

        let category = self
            .post(
                "/api/v1/store-cat",
                Some(&token),
                serde_json::json!({ "store_cat_id": store_cat_id, "name": "Hardware" }),
            )
            .await;
        assert_eq!(category.status, StatusCode::OK, "{}", category.body);

        let store = self
            .post(
                "/api/v1/store",
                Some(&token),
                serde_json::json!({
                    "name": format!("{email} store"),
                    "address": "1 Depot Rd",
                    "store_cat_id": store_cat_id,
                    "nominal_delivery_price": rate,
                }),
            )
            .await;
        assert_eq!(store.status, StatusCode::CREATED, "{}", store.body);

        let records: Vec<Value> = products
            .iter()
            .map(|&(stock_number, price, weight_class)| {
                serde_json::json!({
                    "stock_number": stock_number,
                    "name": format!("Item {stock_number}"),
                    "price": price,
                    "recommended_price": price,
                    "weight_class": weight_class,
                    "amount": 10,
                })
            })
            .collect();
        let import = self
            .post(
                "/api/v1/goods-import",
                Some(&token),
                serde_json::json!({ "products": records }),
            )
            .await;
        assert_eq!(import.status, StatusCode::ACCEPTED, "{}", import.body);
        self.email(email, "Product import finished").await;

        token
    }
}

/// The request path of the activation link in an email body.
pub fn activation_path(body: &str) -> &str {
    let start = body
        .find("/api/v1/email-activation/")
        .expect("activation link in email");
    body.get(start..)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap_or_default()
}

/// Numeric value of a money field, whatever its scale.
pub fn amount(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        other => other.as_f64().expect("number"),
    }
}
