//! Self-service customer profile.

use thiserror::Error;
use tracing::instrument;

use crate::db::{Repository, RepositoryError};
use crate::models::{Customer, CustomerUpdate};
use crate::services::auth::{AuthError, hash_password, validate_password};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("{0}")]
    Validation(String),

    #[error("Customer not found")]
    NotFound,

    #[error("password hashing error")]
    PasswordHash,

    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ProfileError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound => Self::NotFound,
            other => Self::Repository(other),
        }
    }
}

impl From<AuthError> for ProfileError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::WeakPassword(msg) | AuthError::Validation(msg) => Self::Validation(msg),
            AuthError::Repository(e) => e.into(),
            _ => Self::PasswordHash,
        }
    }
}

/// Profile fields a customer may change. Email and vendor status are fixed.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub password: Option<String>,
    pub user_name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub organization: Option<String>,
    pub address: Option<String>,
    pub area_code: Option<i32>,
}

pub struct CustomerService<'a> {
    repo: &'a dyn Repository,
}

impl<'a> CustomerService<'a> {
    #[must_use]
    pub const fn new(repo: &'a dyn Repository) -> Self {
        Self { repo }
    }

    /// Apply a partial profile update.
    ///
    /// A new password goes through the same rules as at signup and is
    /// stored hashed.
    ///
    /// # Errors
    ///
    /// `Validation` for blank required fields, a non-positive area code or a
    /// weak password; `NotFound` if the account vanished.
    #[instrument(skip(self, customer, update), fields(customer_id = %customer.id))]
    pub async fn update(
        &self,
        customer: &Customer,
        update: ProfileUpdate,
    ) -> Result<Customer, ProfileError> {
        let password_hash = match update.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };
        if let Some(area_code) = update.area_code
            && area_code < 1
        {
            return Err(ProfileError::Validation(
                "area_code must be positive".to_owned(),
            ));
        }

        let changes = CustomerUpdate {
            password_hash,
            user_name: non_blank("user_name", update.user_name)?,
            first_name: non_blank("first_name", update.first_name)?,
            last_name: non_blank("last_name", update.last_name)?,
            phone_number: non_blank("phone_number", update.phone_number)?,
            organization: update.organization,
            address: update.address,
            area_code: update.area_code,
            is_active: None,
        };

        let updated = self.repo.update_customer(customer.id, &changes).await?;
        tracing::info!(
            password_changed = changes.password_hash.is_some(),
            "Customer profile updated"
        );
        Ok(updated)
    }

    /// Delete the account with its session, basket, store and orders.
    ///
    /// # Errors
    ///
    /// `NotFound` if the account is already gone.
    #[instrument(skip(self, customer), fields(customer_id = %customer.id))]
    pub async fn delete(&self, customer: &Customer) -> Result<(), ProfileError> {
        if !self.repo.delete_customer(customer.id).await? {
            return Err(ProfileError::NotFound);
        }
        tracing::info!("Customer deleted");
        Ok(())
    }
}

fn non_blank(field: &str, value: Option<String>) -> Result<Option<String>, ProfileError> {
    match value {
        Some(v) if v.trim().is_empty() => Err(ProfileError::Validation(format!(
            "{field} must not be empty"
        ))),
        Some(v) => Ok(Some(v.trim().to_owned())),
        None => Ok(None),
    }
}
