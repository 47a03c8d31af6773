//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Service errors convert into
//! `AppError` here, so no service or database error type crosses the HTTP
//! boundary. Responses share one JSON shape:
//!
//! ```json
//! {"status": false, "code": "not_found", "error": "Order not found"}
//! ```
//!
//! Server errors are captured to Sentry and answered with a generic message.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::access::AccessError;
use crate::services::auth::AuthError;
use crate::services::basket::BasketError;
use crate::services::catalog::CatalogError;
use crate::services::customers::ProfileError;
use crate::services::jobs::QueueError;
use crate::services::orders::OrderError;
use crate::services::session::SessionError;

/// Application-level error type for the marketplace API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or invalid input.
    #[error("{0}")]
    Validation(String),

    /// No session, or the session expired.
    #[error("{0}")]
    Unauthenticated(String),

    /// Authenticated, but not allowed.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// A required precondition (basket, address, store) is missing.
    #[error("{0}")]
    FailedPrecondition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Too many requests, please slow down")]
    RateLimited,

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: bool,
    code: &'static str,
    error: &'a str,
}

impl AppError {
    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::FailedPrecondition(_) => "failed_precondition",
            Self::Conflict(_) => "conflict",
            Self::RateLimited => "rate_limited",
            Self::Database(_) | Self::Internal(_) => "internal",
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) | Self::FailedPrecondition(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::NOT_ACCEPTABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = if self.is_server_error() {
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        let body = ErrorBody {
            status: false,
            code: self.code(),
            error: &message,
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

// =============================================================================
// Service error conversions
// =============================================================================

impl From<AccessError> for AppError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::NotFound(_) => Self::NotFound(e.to_string()),
            AccessError::Forbidden(_) => Self::Forbidden(e.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::Repository(e) => Self::Database(e),
            SessionError::Inactive => Self::Forbidden(e.to_string()),
            SessionError::Malformed | SessionError::Invalid | SessionError::Expired => {
                Self::Unauthenticated(e.to_string())
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidEmail(_) | AuthError::Validation(_) | AuthError::WeakPassword(_) => {
                Self::Validation(e.to_string())
            }
            AuthError::UserAlreadyExists => Self::Conflict(e.to_string()),
            AuthError::UserNotFound => Self::NotFound(e.to_string()),
            AuthError::InvalidActivation => Self::NotFound(e.to_string()),
            AuthError::EmailNotVerified | AuthError::ActivationResent | AuthError::Inactive => {
                Self::Forbidden(e.to_string())
            }
            AuthError::InvalidCredentials => Self::Unauthenticated(e.to_string()),
            AuthError::Session(e) => e.into(),
            AuthError::Repository(e) => Self::Database(e),
            AuthError::Email(_) | AuthError::PasswordHash => Self::Internal(e.to_string()),
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::Validation(msg) => Self::Validation(msg),
            ProfileError::NotFound => Self::NotFound(e.to_string()),
            ProfileError::Repository(e) => Self::Database(e),
            ProfileError::PasswordHash => Self::Internal(e.to_string()),
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::Validation(msg) => Self::Validation(msg),
            CatalogError::NotFound(msg) => Self::NotFound(msg),
            CatalogError::FailedPrecondition(msg) => Self::FailedPrecondition(msg),
            CatalogError::Conflict(msg) => Self::Conflict(msg),
            CatalogError::Access(e) => e.into(),
            CatalogError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<BasketError> for AppError {
    fn from(e: BasketError) -> Self {
        match e {
            BasketError::InvalidQuantity => Self::Validation(e.to_string()),
            BasketError::ProductNotFound(_)
            | BasketError::NoActiveVendor(_)
            | BasketError::NotInBasket(_) => Self::NotFound(e.to_string()),
            BasketError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::FailedPrecondition(msg) => Self::FailedPrecondition(msg.to_owned()),
            OrderError::Validation(msg) => Self::Validation(msg),
            OrderError::Access(e) => e.into(),
            OrderError::Conflict(msg) => Self::Conflict(msg),
            OrderError::InvalidTransition { .. } => Self::Conflict(e.to_string()),
            OrderError::NumbersExhausted
            | OrderError::CorruptBasket(_)
            | OrderError::PricingOverflow => Self::Internal(e.to_string()),
            OrderError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        Self::Internal(e.to_string())
    }
}

// =============================================================================
// JSON extractor
// =============================================================================

/// `Json` extractor whose rejection uses the API error shape.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::Validation(json_rejection_message(&rejection))),
        }
    }
}

fn json_rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(e) => e.body_text(),
        JsonRejection::JsonSyntaxError(_) => "Request body is not valid JSON".to_owned(),
        JsonRejection::MissingJsonContentType(_) => {
            "Expected request with `Content-Type: application/json`".to_owned()
        }
        other => other.body_text(),
    }
}

// =============================================================================
// Sentry helpers
// =============================================================================

/// Associate subsequent Sentry events with the authenticated customer.
pub fn set_sentry_user(customer_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(customer_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for a business event.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_owned(),
                serde_json::Value::String((*value).to_owned()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
