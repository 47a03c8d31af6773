//! Session token queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use marketplace_core::CustomerId;

use super::{PgRepository, RepositoryError, SessionRepository};
use crate::models::SessionRecord;

#[async_trait]
impl SessionRepository for PgRepository {
    async fn replace_session(
        &self,
        customer: CustomerId,
        token_digest: &str,
        created_at: DateTime<Utc>,
    ) -> Result<SessionRecord, RepositoryError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r"
            INSERT INTO marketplace.session_token (customer_id, token_digest, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id) DO UPDATE
                SET token_digest = EXCLUDED.token_digest,
                    created_at = EXCLUDED.created_at
            RETURNING customer_id, token_digest, created_at
            ",
        )
        .bind(customer)
        .bind(token_digest)
        .bind(created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn session_for(
        &self,
        customer: CustomerId,
    ) -> Result<Option<SessionRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r"
            SELECT customer_id, token_digest, created_at
            FROM marketplace.session_token
            WHERE customer_id = $1
            ",
        )
        .bind(customer)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_session(&self, customer: CustomerId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM marketplace.session_token WHERE customer_id = $1")
            .bind(customer)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
