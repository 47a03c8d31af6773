//! Bearer-token authentication extractor.
//!
//! Handlers that need a logged-in customer take [`RequireCustomer`]:
//!
//! ```rust,ignore
//! async fn basket(RequireCustomer(customer): RequireCustomer) -> impl IntoResponse {
//!     format!("Hello, {}!", customer.email)
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use chrono::Utc;

use crate::error::{AppError, set_sentry_user};
use crate::models::Customer;
use crate::services::session::SessionService;
use crate::state::AppState;

/// The authenticated customer.
///
/// Rejects with `401 unauthenticated` when the header is missing, the
/// token is unknown or the session is older than one hour, and with
/// `403 forbidden` for deactivated accounts.
pub struct RequireCustomer(pub Customer);

impl FromRequestParts<AppState> for RequireCustomer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            AppError::Unauthenticated("Authentication credentials were not provided".to_owned())
        })?;

        let customer = SessionService::new(state.repo(), &state.config().session_secret)
            .authenticate(token, Utc::now())
            .await?;

        tracing::Span::current().record("customer_id", tracing::field::display(customer.id));
        set_sentry_user(&customer.id);

        Ok(Self(customer))
    }
}

/// Token from an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}
