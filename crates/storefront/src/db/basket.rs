//! Basket queries.

use async_trait::async_trait;

use marketplace_core::{BasketLineId, CustomerId, ProductId, StoreId};

use super::{BasketRepository, PgRepository, RepositoryError};
use crate::models::BasketLine;

/// Basket lines joined with the product price and the vendor's delivery rate.
pub(super) const BASKET_SELECT: &str = r"
    SELECT b.id, b.customer_id, b.product_id, b.store_id, b.quantity,
           p.stock_number, p.name AS product_name, p.price AS unit_price, p.weight_class,
           s.name AS store_name, s.nominal_delivery_price
    FROM marketplace.basket_line b
    JOIN marketplace.product p ON p.id = b.product_id
    JOIN marketplace.store s ON s.id = b.store_id
";

#[async_trait]
impl BasketRepository for PgRepository {
    async fn upsert_basket_line(
        &self,
        customer: CustomerId,
        product: ProductId,
        store: StoreId,
        quantity: i32,
    ) -> Result<BasketLine, RepositoryError> {
        let id: BasketLineId = sqlx::query_scalar(
            r"
            INSERT INTO marketplace.basket_line (customer_id, product_id, store_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (customer_id, product_id, store_id)
                DO UPDATE SET quantity = EXCLUDED.quantity
            RETURNING id
            ",
        )
        .bind(customer)
        .bind(product)
        .bind(store)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!("{BASKET_SELECT} WHERE b.id = $1");
        sqlx::query_as::<_, BasketLine>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn basket_lines(&self, customer: CustomerId) -> Result<Vec<BasketLine>, RepositoryError> {
        let sql = format!("{BASKET_SELECT} WHERE b.customer_id = $1 ORDER BY b.id");
        let lines = sqlx::query_as::<_, BasketLine>(&sql)
            .bind(customer)
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    async fn remove_basket_product(
        &self,
        customer: CustomerId,
        product: ProductId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM marketplace.basket_line WHERE customer_id = $1 AND product_id = $2",
        )
        .bind(customer)
        .bind(product)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
