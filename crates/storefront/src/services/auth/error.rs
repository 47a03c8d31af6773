//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::session::SessionError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] marketplace_core::EmailError),

    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// Password too weak or invalid.
    #[error("{0}")]
    WeakPassword(String),

    /// User already exists.
    #[error("An account with this email already exists")]
    UserAlreadyExists,

    /// No customer with this email.
    #[error("Customer with this email does not exist")]
    UserNotFound,

    /// Login before the activation link was followed.
    #[error("Please request confirmation link again")]
    EmailNotVerified,

    /// Login before activation; a new activation link was sent.
    #[error("Please confirm your email address")]
    ActivationResent,

    /// Wrong password.
    #[error("Incorrect password")]
    InvalidCredentials,

    /// Account deactivated.
    #[error("Customer is not active")]
    Inactive,

    /// Unknown customer or bad activation token.
    #[error("Activation link is invalid")]
    InvalidActivation,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Activation email could not be rendered.
    #[error("email error: {0}")]
    Email(#[from] crate::services::email::EmailError),

    /// Session could not be issued.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
