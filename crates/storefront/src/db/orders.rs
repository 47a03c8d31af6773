//! Order queries and the checkout transaction.

use async_trait::async_trait;
use sqlx::{Postgres, Transaction};

use marketplace_core::{BasketLineId, CustomerId, OrderId, OrderNumber, OrderStatus};

use super::basket::BASKET_SELECT;
use super::{CheckoutTransaction, OrderRepository, PgRepository, RepositoryError};
use crate::models::{BasketLine, Customer, NewOrder, NewOrderItem, Order, OrderItem};

const ORDER_COLUMNS: &str = "id, order_number, customer_id, area_code, total_price, \
     final_delivery_price, express_delivery, status, created_at";

/// Checkout inside a single database transaction.
///
/// The customer row is locked `FOR UPDATE` when the transaction opens, which
/// serializes concurrent checkouts of the same customer. Reading the basket
/// locks its lines too, so quantity edits wait for the checkout to finish.
struct PgCheckout {
    tx: Transaction<'static, Postgres>,
    customer: Customer,
}

#[async_trait]
impl CheckoutTransaction for PgCheckout {
    fn customer(&self) -> &Customer {
        &self.customer
    }

    async fn basket_lines(&mut self) -> Result<Vec<BasketLine>, RepositoryError> {
        let sql =
            format!("{BASKET_SELECT} WHERE b.customer_id = $1 ORDER BY b.id FOR UPDATE OF b");
        let lines = sqlx::query_as::<_, BasketLine>(&sql)
            .bind(self.customer.id)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(lines)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "INSERT INTO marketplace.customer_order
                (order_number, customer_id, area_code, total_price, final_delivery_price,
                 express_delivery)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (order_number) DO NOTHING
             RETURNING {ORDER_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Order>(&sql)
            .bind(order.order_number)
            .bind(order.customer_id)
            .bind(order.area_code)
            .bind(order.total_price)
            .bind(order.final_delivery_price)
            .bind(order.express_delivery)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(inserted)
    }

    async fn insert_item(
        &mut self,
        order: OrderId,
        item: &NewOrderItem,
    ) -> Result<OrderItem, RepositoryError> {
        let inserted = sqlx::query_as::<_, OrderItem>(
            r"
            INSERT INTO marketplace.order_item
                (order_id, product_id, store_id, stock_number, unit_price, quantity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, order_id, product_id, store_id, stock_number, unit_price, quantity
            ",
        )
        .bind(order)
        .bind(item.product_id)
        .bind(item.store_id)
        .bind(item.stock_number)
        .bind(item.unit_price)
        .bind(item.quantity)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(inserted)
    }

    async fn drain_basket(&mut self) -> Result<Vec<(BasketLineId, i32)>, RepositoryError> {
        let drained = sqlx::query_as::<_, (BasketLineId, i32)>(
            "DELETE FROM marketplace.basket_line WHERE customer_id = $1 RETURNING id, quantity",
        )
        .bind(self.customer.id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(drained)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PgRepository {
    async fn begin_checkout(
        &self,
        customer: CustomerId,
    ) -> Result<Box<dyn CheckoutTransaction>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let customer = sqlx::query_as::<_, Customer>(
            r"
            SELECT id, email, password_hash, email_verified, is_active, user_name,
                   first_name, last_name, phone_number, organization, address, area_code,
                   is_vendor, seller_vendor_id, created_at, updated_at
            FROM marketplace.customer
            WHERE id = $1
            FOR UPDATE
            ",
        )
        .bind(customer)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(Box::new(PgCheckout { tx, customer }))
    }

    async fn orders_for(&self, customer: CustomerId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.customer_order
             WHERE customer_id = $1
             ORDER BY created_at DESC, id DESC"
        );
        let orders = sqlx::query_as::<_, Order>(&sql)
            .bind(customer)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    async fn order_for(
        &self,
        customer: CustomerId,
        number: OrderNumber,
    ) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.customer_order
             WHERE customer_id = $1 AND order_number = $2"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(customer)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn order_by_number(&self, number: OrderNumber) -> Result<Option<Order>, RepositoryError> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM marketplace.customer_order WHERE order_number = $1"
        );
        let order = sqlx::query_as::<_, Order>(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    async fn order_items(&self, order: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let items = sqlx::query_as::<_, OrderItem>(
            r"
            SELECT id, order_id, product_id, store_id, stock_number, unit_price, quantity
            FROM marketplace.order_item
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(order)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    async fn delete_order(
        &self,
        order: OrderId,
        expected: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM marketplace.customer_order WHERE id = $1 AND status = $2")
                .bind(order)
                .bind(expected)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_order_status(
        &self,
        order: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE marketplace.customer_order SET status = $3 WHERE id = $1 AND status = $2",
        )
        .bind(order)
        .bind(from)
        .bind(to)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
