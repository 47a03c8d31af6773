//! Authentication service.
//!
//! Signup with email activation, password login issuing a bearer session,
//! and logout.

mod error;

pub use error::AuthError;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::instrument;

use marketplace_core::{CustomerId, Email};

use crate::db::{Repository, RepositoryError};
use crate::models::{Customer, NewCustomer};
use crate::services::email::OutgoingEmail;
use crate::services::jobs::JobQueue;
use crate::services::session::{IssuedSession, SessionService};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Range public vendor numbers are drawn from.
const VENDOR_IDS: std::ops::RangeInclusive<i64> = 200..=20_000_000;

/// Attempts at drawing an unused vendor number.
const MAX_VENDOR_ID_ATTEMPTS: usize = 8;

/// Signup form.
#[derive(Debug, Clone)]
pub struct Signup {
    pub email: String,
    pub password: String,
    pub user_name: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub organization: Option<String>,
    pub address: Option<String>,
    pub area_code: i32,
    pub is_vendor: bool,
}

/// Authentication service.
///
/// Handles customer registration, activation, login and logout.
pub struct AuthService<'a> {
    repo: &'a dyn Repository,
    jobs: &'a JobQueue,
    secret: &'a SecretString,
    base_url: &'a str,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    ///
    /// `base_url` is the public origin used in activation links.
    #[must_use]
    pub const fn new(
        repo: &'a dyn Repository,
        jobs: &'a JobQueue,
        secret: &'a SecretString,
        base_url: &'a str,
    ) -> Self {
        Self {
            repo,
            jobs,
            secret,
            base_url,
        }
    }

    // =========================================================================
    // Signup
    // =========================================================================

    /// Register a new customer and send the activation email.
    ///
    /// Vendors are assigned a random public vendor number.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` if the email format is invalid.
    /// Returns `AuthError::Validation` if a required field is blank.
    /// Returns `AuthError::WeakPassword` if the password doesn't meet requirements.
    /// Returns `AuthError::UserAlreadyExists` if the email is already registered.
    #[instrument(skip_all, fields(is_vendor = signup.is_vendor))]
    pub async fn register(&self, signup: Signup) -> Result<Customer, AuthError> {
        let email = Email::parse(&signup.email)?;
        for (field, value) in [
            ("user_name", &signup.user_name),
            ("first_name", &signup.first_name),
            ("last_name", &signup.last_name),
            ("phone_number", &signup.phone_number),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::Validation(format!("{field} must not be empty")));
            }
        }
        if signup.area_code <= 0 {
            return Err(AuthError::Validation(
                "area_code must be a positive number".to_owned(),
            ));
        }
        validate_password(&signup.password)?;

        let mut new = NewCustomer {
            email,
            password_hash: hash_password(&signup.password)?,
            user_name: signup.user_name.trim().to_owned(),
            first_name: signup.first_name.trim().to_owned(),
            last_name: signup.last_name.trim().to_owned(),
            phone_number: signup.phone_number.trim().to_owned(),
            organization: signup.organization,
            address: signup.address,
            area_code: signup.area_code,
            is_vendor: signup.is_vendor,
            seller_vendor_id: None,
        };

        let mut attempts = 0;
        let customer = loop {
            attempts += 1;
            if new.is_vendor {
                new.seller_vendor_id = Some(rand::rng().random_range(VENDOR_IDS));
            }

            match self.repo.create_customer(&new).await {
                Ok(customer) => break customer,
                Err(RepositoryError::Conflict(msg))
                    if new.is_vendor
                        && msg.contains("vendor id")
                        && attempts < MAX_VENDOR_ID_ATTEMPTS =>
                {
                    tracing::debug!(attempts, "Vendor id collision, retrying");
                }
                Err(RepositoryError::Conflict(_)) => return Err(AuthError::UserAlreadyExists),
                Err(other) => return Err(AuthError::Repository(other)),
            }
        };

        tracing::info!(customer_id = %customer.id, "Customer registered");
        self.send_activation(&customer);
        Ok(customer)
    }

    /// Follow an activation link.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidActivation` if the uid is unknown or the
    /// token does not match (including links already used).
    #[instrument(skip_all)]
    pub async fn activate(&self, uid: &str, token: &str) -> Result<Customer, AuthError> {
        let id = decode_uid(uid).ok_or(AuthError::InvalidActivation)?;
        let customer = self
            .repo
            .customer_by_id(id)
            .await?
            .ok_or(AuthError::InvalidActivation)?;

        let expected = hex::decode(token).map_err(|_| AuthError::InvalidActivation)?;
        self.activation_mac(&customer)?
            .verify_slice(&expected)
            .map_err(|_| AuthError::InvalidActivation)?;

        if !self.repo.mark_email_verified(customer.id).await? {
            return Err(AuthError::InvalidActivation);
        }
        tracing::info!(customer_id = %customer.id, "Email verified");

        Ok(Customer {
            email_verified: true,
            ..customer
        })
    }

    /// Activation link for `customer` in its current state.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidActivation` if the signing key is unusable.
    pub fn activation_link(&self, customer: &Customer) -> Result<String, AuthError> {
        let uid = URL_SAFE_NO_PAD.encode(customer.id.to_string());
        let token = hex::encode(self.activation_mac(customer)?.finalize().into_bytes());
        Ok(format!(
            "{}/api/v1/email-activation/{uid}/{token}",
            self.base_url
        ))
    }

    fn send_activation(&self, customer: &Customer) {
        let email = self
            .activation_link(customer)
            .and_then(|link| Ok(OutgoingEmail::activation(customer, &link)?));
        match email {
            Ok(email) => self.jobs.send_email(email),
            Err(e) => tracing::error!(error = %e, "Failed to prepare activation email"),
        }
    }

    /// The verification flag is part of the message, so a link stops working
    /// once it has been used.
    fn activation_mac(&self, customer: &Customer) -> Result<Hmac<Sha256>, AuthError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| AuthError::InvalidActivation)?;
        mac.update(
            format!(
                "activate:{}:{}:{}",
                customer.id, customer.email, customer.email_verified
            )
            .as_bytes(),
        );
        Ok(mac)
    }

    // =========================================================================
    // Login / logout
    // =========================================================================

    /// Login with email and password.
    ///
    /// An unverified customer can ask for a fresh activation link with
    /// `resend_activation`.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound`, `EmailNotVerified`/`ActivationResent`,
    /// `InvalidCredentials` or `Inactive`, checked in that order.
    #[instrument(skip_all)]
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        resend_activation: bool,
    ) -> Result<(Customer, IssuedSession), AuthError> {
        let email = Email::parse(email)?;
        let customer = self
            .repo
            .customer_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !customer.email_verified {
            if resend_activation {
                self.send_activation(&customer);
                return Err(AuthError::ActivationResent);
            }
            return Err(AuthError::EmailNotVerified);
        }

        verify_password(password, &customer.password_hash)?;

        if !customer.is_active {
            return Err(AuthError::Inactive);
        }

        let session = SessionService::new(self.repo, self.secret)
            .issue(customer.id)
            .await?;
        tracing::info!(customer_id = %customer.id, "Customer logged in");

        Ok((customer, session))
    }

    /// Delete the customer's session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Session` on storage failure.
    pub async fn logout(&self, customer: CustomerId) -> Result<(), AuthError> {
        SessionService::new(self.repo, self.secret)
            .revoke(customer)
            .await?;
        tracing::info!(customer_id = %customer, "Customer logged out");
        Ok(())
    }
}

fn decode_uid(uid: &str) -> Option<CustomerId> {
    let raw = URL_SAFE_NO_PAD.decode(uid).ok()?;
    String::from_utf8(raw).ok()?.parse().ok()
}

// =============================================================================
// Password helpers
// =============================================================================

/// Check password strength: minimum length, not entirely numeric.
///
/// # Errors
///
/// Returns `AuthError::WeakPassword` describing the first failed rule.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "This password is too short. It must contain at least {MIN_PASSWORD_LENGTH} characters."
        )));
    }

    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "This password is entirely numeric.".to_owned(),
        ));
    }

    Ok(())
}

/// Hash a password using Argon2id.
///
/// # Errors
///
/// Returns `AuthError::PasswordHash` if hashing fails.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
