//! Customer queries.

use async_trait::async_trait;

use marketplace_core::{CustomerId, Email};

use super::{CustomerRepository, PgRepository, RepositoryError, conflict_or_database};
use crate::models::{Customer, CustomerUpdate, NewCustomer};

#[async_trait]
impl CustomerRepository for PgRepository {
    async fn create_customer(&self, new: &NewCustomer) -> Result<Customer, RepositoryError> {
        sqlx::query_as::<_, Customer>(
            r"
            INSERT INTO marketplace.customer
                (email, password_hash, user_name, first_name, last_name, phone_number,
                 organization, address, area_code, is_vendor, seller_vendor_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, email, password_hash, email_verified, is_active, user_name,
                      first_name, last_name, phone_number, organization, address, area_code,
                      is_vendor, seller_vendor_id, created_at, updated_at
            ",
        )
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.user_name)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone_number)
        .bind(&new.organization)
        .bind(&new.address)
        .bind(new.area_code)
        .bind(new.is_vendor)
        .bind(new.seller_vendor_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            conflict_or_database(e, |constraint| match constraint {
                Some("customer_seller_vendor_id_key") => "vendor id already taken".to_owned(),
                _ => "email already exists".to_owned(),
            })
        })
    }

    async fn customer_by_id(&self, id: CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customer = sqlx::query_as::<_, Customer>(
            r"
            SELECT id, email, password_hash, email_verified, is_active, user_name,
                   first_name, last_name, phone_number, organization, address, area_code,
                   is_vendor, seller_vendor_id, created_at, updated_at
            FROM marketplace.customer
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn customer_by_email(&self, email: &Email) -> Result<Option<Customer>, RepositoryError> {
        let customer = sqlx::query_as::<_, Customer>(
            r"
            SELECT id, email, password_hash, email_verified, is_active, user_name,
                   first_name, last_name, phone_number, organization, address, area_code,
                   is_vendor, seller_vendor_id, created_at, updated_at
            FROM marketplace.customer
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        update: &CustomerUpdate,
    ) -> Result<Customer, RepositoryError> {
        sqlx::query_as::<_, Customer>(
            r"
            UPDATE marketplace.customer SET
                password_hash = COALESCE($2, password_hash),
                user_name     = COALESCE($3, user_name),
                first_name    = COALESCE($4, first_name),
                last_name     = COALESCE($5, last_name),
                phone_number  = COALESCE($6, phone_number),
                organization  = COALESCE($7, organization),
                address       = COALESCE($8, address),
                area_code     = COALESCE($9, area_code),
                is_active     = COALESCE($10, is_active),
                updated_at    = NOW()
            WHERE id = $1
            RETURNING id, email, password_hash, email_verified, is_active, user_name,
                      first_name, last_name, phone_number, organization, address, area_code,
                      is_vendor, seller_vendor_id, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(&update.password_hash)
        .bind(&update.user_name)
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&update.phone_number)
        .bind(&update.organization)
        .bind(&update.address)
        .bind(update.area_code)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn mark_email_verified(&self, id: CustomerId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE marketplace.customer
            SET email_verified = TRUE, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Products restrict store deletion, so clear them before the cascade.
        sqlx::query(
            r"
            DELETE FROM marketplace.product p
            USING marketplace.store s
            WHERE p.store_id = s.id AND s.owner_id = $1
            ",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM marketplace.customer WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}
