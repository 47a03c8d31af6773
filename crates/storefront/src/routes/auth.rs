//! Account route handlers: signup, email activation, login and logout.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{ApiJson, Result, add_breadcrumb};
use crate::middleware::RequireCustomer;
use crate::models::Customer;
use crate::routes::Message;
use crate::services::auth::{AuthService, Signup};
use crate::state::AppState;

fn auth_service(state: &AppState) -> AuthService<'_> {
    let config = state.config();
    AuthService::new(
        state.repo(),
        state.jobs(),
        &config.session_secret,
        &config.base_url,
    )
}

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub area_code: i32,
    #[serde(default)]
    pub is_vendor: bool,
}

impl From<SignupRequest> for Signup {
    fn from(req: SignupRequest) -> Self {
        Self {
            email: req.email,
            password: req.password,
            user_name: req.user_name,
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
            organization: req.organization,
            address: req.address,
            area_code: req.area_code,
            is_vendor: req.is_vendor,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Send a fresh activation link if the email is not yet confirmed.
    #[serde(default)]
    pub resend_email: bool,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: bool,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/v1/user-signup
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<(StatusCode, Json<Customer>)> {
    let customer = auth_service(&state).register(req.into()).await?;
    add_breadcrumb("auth", "Customer signed up", None);
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /api/v1/email-activation/{uid}/{token}
pub async fn activate_email(
    State(state): State<AppState>,
    Path((uid, token)): Path<(String, String)>,
) -> Result<Json<Message>> {
    auth_service(&state).activate(&uid, &token).await?;
    Ok(Message::new("Email address confirmed"))
}

/// POST /api/v1/login
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (customer, session) = auth_service(&state)
        .login(&req.email, &req.password, req.resend_email)
        .await?;
    let customer_id = customer.id.to_string();
    add_breadcrumb(
        "auth",
        "Customer logged in",
        Some(&[("customer_id", customer_id.as_str())]),
    );

    Ok(Json(LoginResponse {
        status: true,
        token: session.token,
        created_at: session.created_at,
        expires_at: session.expires_at,
    }))
}

/// POST /api/v1/logout
pub async fn logout(
    State(state): State<AppState>,
    RequireCustomer(customer): RequireCustomer,
) -> Result<Json<Message>> {
    auth_service(&state).logout(customer.id).await?;
    Ok(Message::new("Logged out"))
}
