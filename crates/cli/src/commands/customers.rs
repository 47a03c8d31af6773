//! Customer account commands.

use marketplace_core::{Email, EmailError};
use marketplace_storefront::db::{CustomerRepository, RepositoryError, SessionRepository};
use marketplace_storefront::models::CustomerUpdate;
use thiserror::Error;

use super::{ConnectError, repository};

#[derive(Debug, Error)]
pub enum CustomerCommandError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("No customer with email: {0}")]
    NotFound(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Enable or disable login for the customer registered under `email`.
///
/// Disabling also ends any open session.
pub async fn set_active(email: &str, active: bool) -> Result<(), CustomerCommandError> {
    let email = Email::parse(email)?;
    let repo = repository().await?;

    let customer = repo
        .customer_by_email(&email)
        .await?
        .ok_or_else(|| CustomerCommandError::NotFound(email.to_string()))?;

    let update = CustomerUpdate {
        is_active: Some(active),
        ..CustomerUpdate::default()
    };
    repo.update_customer(customer.id, &update).await?;
    if !active {
        repo.delete_session(customer.id).await?;
    }

    tracing::info!(customer_id = %customer.id, active, "Customer updated");
    Ok(())
}
