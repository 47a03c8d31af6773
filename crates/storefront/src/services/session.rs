//! Bearer session tokens.
//!
//! A token has the form `<customer id>.<secret>`. Only an HMAC-SHA256 digest
//! of the secret, keyed with the session secret, is persisted, one per
//! customer. Issuing a token replaces any previous one, so a customer holds
//! at most one valid token. Tokens expire [`SESSION_TTL_SECS`] after issuance;
//! an expired token is rejected but left in place until the next login.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;
use thiserror::Error;

use marketplace_core::CustomerId;

use crate::db::{Repository, RepositoryError};
use crate::models::Customer;

type HmacSha256 = Hmac<Sha256>;

/// Session lifetime in seconds.
pub const SESSION_TTL_SECS: i64 = 3600;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("malformed session token")]
    Malformed,

    /// No session, a digest mismatch, or a deleted customer.
    #[error("invalid session token")]
    Invalid,

    #[error("session expired")]
    Expired,

    #[error("customer is not active")]
    Inactive,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// A freshly issued token, returned once at login.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct SessionService<'a> {
    repo: &'a dyn Repository,
    secret: &'a SecretString,
}

impl<'a> SessionService<'a> {
    #[must_use]
    pub const fn new(repo: &'a dyn Repository, secret: &'a SecretString) -> Self {
        Self { repo, secret }
    }

    /// Issue a new token for `customer`, revoking the previous one.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Repository` if the session cannot be stored.
    pub async fn issue(&self, customer: CustomerId) -> Result<IssuedSession, SessionError> {
        self.issue_at(customer, Utc::now()).await
    }

    /// Issue a token as if at `now`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Repository` if the session cannot be stored.
    pub async fn issue_at(
        &self,
        customer: CustomerId,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, SessionError> {
        let bytes: [u8; 32] = rand::random();
        let secret = URL_SAFE_NO_PAD.encode(bytes);
        let digest = self.digest(customer, &secret)?;

        let record = self.repo.replace_session(customer, &digest, now).await?;
        tracing::debug!(customer_id = %customer, "Session issued");

        Ok(IssuedSession {
            token: format!("{customer}.{secret}"),
            created_at: record.created_at,
            expires_at: record.created_at + ttl(),
        })
    }

    /// Resolve a bearer token to its customer.
    ///
    /// # Errors
    ///
    /// Returns `Malformed`, `Invalid`, `Expired` or `Inactive` when the token
    /// does not grant access, `Repository` on storage failure.
    pub async fn authenticate(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Customer, SessionError> {
        let (id, secret) = token.split_once('.').ok_or(SessionError::Malformed)?;
        let customer_id: CustomerId = id.parse().map_err(|_| SessionError::Malformed)?;

        let record = self
            .repo
            .session_for(customer_id)
            .await?
            .ok_or(SessionError::Invalid)?;

        let expected = hex::decode(&record.token_digest).map_err(|_| {
            SessionError::Repository(RepositoryError::DataCorruption(format!(
                "session digest of customer {customer_id} is not hex"
            )))
        })?;
        self.mac(customer_id, secret)?
            .verify_slice(&expected)
            .map_err(|_| SessionError::Invalid)?;

        if now - record.created_at >= ttl() {
            return Err(SessionError::Expired);
        }

        let customer = self
            .repo
            .customer_by_id(customer_id)
            .await?
            .ok_or(SessionError::Invalid)?;
        if !customer.is_active {
            return Err(SessionError::Inactive);
        }

        Ok(customer)
    }

    /// Delete the customer's session. Returns `false` if there was none.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Repository` on storage failure.
    pub async fn revoke(&self, customer: CustomerId) -> Result<bool, SessionError> {
        Ok(self.repo.delete_session(customer).await?)
    }

    fn mac(&self, customer: CustomerId, secret: &str) -> Result<HmacSha256, SessionError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SessionError::Malformed)?;
        mac.update(format!("session:{customer}:{secret}").as_bytes());
        Ok(mac)
    }

    fn digest(&self, customer: CustomerId, secret: &str) -> Result<String, SessionError> {
        Ok(hex::encode(self.mac(customer, secret)?.finalize().into_bytes()))
    }
}

fn ttl() -> TimeDelta {
    TimeDelta::seconds(SESSION_TTL_SECS)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marketplace_core::Email;

    use super::*;
    use crate::db::{CustomerRepository, MemoryRepository, SessionRepository};
    use crate::models::NewCustomer;

    fn secret() -> SecretString {
        SecretString::from("k7Pq2vX9mR4tW8zB3nL6yH1jF5sD0gAe".to_owned())
    }

    async fn customer(repo: &MemoryRepository) -> Customer {
        repo.create_customer(&NewCustomer {
            email: Email::parse("ann@example.com").unwrap(),
            password_hash: "x".to_owned(),
            user_name: "ann".to_owned(),
            first_name: "Ann".to_owned(),
            last_name: "Lee".to_owned(),
            phone_number: "+1000".to_owned(),
            organization: None,
            address: None,
            area_code: 1,
            is_vendor: false,
            seller_vendor_id: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn issued_token_authenticates() {
        let repo = MemoryRepository::new();
        let secret = secret();
        let sessions = SessionService::new(&repo, &secret);
        let ann = customer(&repo).await;

        let issued = sessions.issue(ann.id).await.unwrap();
        assert!(issued.token.starts_with(&format!("{}.", ann.id)));
        assert_eq!(issued.expires_at - issued.created_at, TimeDelta::hours(1));

        let found = sessions.authenticate(&issued.token, Utc::now()).await.unwrap();
        assert_eq!(found.id, ann.id);
    }

    #[tokio::test]
    async fn new_login_revokes_previous_token() {
        let repo = MemoryRepository::new();
        let secret = secret();
        let sessions = SessionService::new(&repo, &secret);
        let ann = customer(&repo).await;

        let first = sessions.issue(ann.id).await.unwrap();
        let second = sessions.issue(ann.id).await.unwrap();

        assert!(matches!(
            sessions.authenticate(&first.token, Utc::now()).await,
            Err(SessionError::Invalid)
        ));
        assert!(sessions.authenticate(&second.token, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn token_expires_after_an_hour_and_is_kept() {
        let repo = MemoryRepository::new();
        let secret = secret();
        let sessions = SessionService::new(&repo, &secret);
        let ann = customer(&repo).await;

        let issued_at = Utc::now() - TimeDelta::minutes(61);
        let issued = sessions.issue_at(ann.id, issued_at).await.unwrap();

        assert!(matches!(
            sessions.authenticate(&issued.token, Utc::now()).await,
            Err(SessionError::Expired)
        ));
        assert!(repo.session_for(ann.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn tampered_and_malformed_tokens_are_rejected() {
        let repo = MemoryRepository::new();
        let secret = secret();
        let sessions = SessionService::new(&repo, &secret);
        let ann = customer(&repo).await;
        let issued = sessions.issue(ann.id).await.unwrap();

        let tampered = format!("{}x", issued.token);
        assert!(matches!(
            sessions.authenticate(&tampered, Utc::now()).await,
            Err(SessionError::Invalid)
        ));
        assert!(matches!(
            sessions.authenticate("no-dot", Utc::now()).await,
            Err(SessionError::Malformed)
        ));
        assert!(matches!(
            sessions.authenticate("abc.def", Utc::now()).await,
            Err(SessionError::Malformed)
        ));
    }

    #[tokio::test]
    async fn revoke_logs_out() {
        let repo = MemoryRepository::new();
        let secret = secret();
        let sessions = SessionService::new(&repo, &secret);
        let ann = customer(&repo).await;
        let issued = sessions.issue(ann.id).await.unwrap();

        assert!(sessions.revoke(ann.id).await.unwrap());
        assert!(!sessions.revoke(ann.id).await.unwrap());
        assert!(
            sessions
                .authenticate(&issued.token, Utc::now())
                .await
                .is_err()
        );
    }
}
