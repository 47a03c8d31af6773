//! Store, category and product queries.

use async_trait::async_trait;

use marketplace_core::{
    CustomerId, ProductCategoryId, ProductId, StockNumber, StoreCategoryId, StoreId,
};

use super::{
    PgRepository, ProductRepository, RepositoryError, StoreRepository, conflict_or_database,
};
use crate::models::{
    NewStore, Product, ProductCategory, ProductUpsert, Store, StoreCategory, StoreUpdate,
};

/// Product columns joined with the external category id.
const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.stock_number, p.slug, p.name, p.model, p.store_id, p.category_id,
           pc.prod_cat_id, p.price, p.recommended_price, p.weight_class, p.amount,
           p.description
    FROM marketplace.product p
    LEFT JOIN marketplace.product_category pc ON pc.id = p.category_id
";

#[async_trait]
impl StoreRepository for PgRepository {
    async fn create_store(
        &self,
        new: &NewStore,
        category: StoreCategoryId,
    ) -> Result<Store, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let store = sqlx::query_as::<_, Store>(
            r"
            INSERT INTO marketplace.store
                (owner_id, name, address, url, nominal_delivery_price, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, owner_id, name, address, url, nominal_delivery_price, status
            ",
        )
        .bind(new.owner_id)
        .bind(&new.name)
        .bind(&new.address)
        .bind(&new.url)
        .bind(new.nominal_delivery_price)
        .bind(new.status)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_or_database(e, |_| "customer already owns a store".to_owned()))?;

        sqlx::query(
            r"
            INSERT INTO marketplace.store_category_member (store_id, category_id)
            VALUES ($1, $2)
            ",
        )
        .bind(store.id)
        .bind(category)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(store)
    }

    async fn store_by_id(&self, id: StoreId) -> Result<Option<Store>, RepositoryError> {
        let store = sqlx::query_as::<_, Store>(
            r"
            SELECT id, owner_id, name, address, url, nominal_delivery_price, status
            FROM marketplace.store
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    async fn store_by_owner(&self, owner: CustomerId) -> Result<Option<Store>, RepositoryError> {
        let store = sqlx::query_as::<_, Store>(
            r"
            SELECT id, owner_id, name, address, url, nominal_delivery_price, status
            FROM marketplace.store
            WHERE owner_id = $1
            ",
        )
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(store)
    }

    async fn update_store(
        &self,
        id: StoreId,
        update: &StoreUpdate,
        category: Option<StoreCategoryId>,
    ) -> Result<Store, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let store = sqlx::query_as::<_, Store>(
            r"
            UPDATE marketplace.store SET
                name                   = COALESCE($2, name),
                address                = COALESCE($3, address),
                url                    = COALESCE($4, url),
                nominal_delivery_price = COALESCE($5, nominal_delivery_price),
                status                 = COALESCE($6, status)
            WHERE id = $1
            RETURNING id, owner_id, name, address, url, nominal_delivery_price, status
            ",
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.address)
        .bind(&update.url)
        .bind(update.nominal_delivery_price)
        .bind(update.status)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if let Some(category) = category {
            sqlx::query(
                r"
                INSERT INTO marketplace.store_category_member (store_id, category_id)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                ",
            )
            .bind(id)
            .bind(category)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(store)
    }

    async fn delete_store(&self, id: StoreId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM marketplace.store WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                conflict_or_database(e, |_| format!("store {id} still lists products"))
            })?;

        Ok(result.rows_affected() > 0)
    }

    async fn categories_of_store(
        &self,
        id: StoreId,
    ) -> Result<Vec<StoreCategory>, RepositoryError> {
        let categories = sqlx::query_as::<_, StoreCategory>(
            r"
            SELECT sc.id, sc.store_cat_id, sc.name, sc.created_by
            FROM marketplace.store_category sc
            JOIN marketplace.store_category_member m ON m.category_id = sc.id
            WHERE m.store_id = $1
            ORDER BY sc.store_cat_id
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn upsert_store_category(
        &self,
        store_cat_id: i64,
        name: &str,
        created_by: CustomerId,
    ) -> Result<StoreCategory, RepositoryError> {
        let category = sqlx::query_as::<_, StoreCategory>(
            r"
            INSERT INTO marketplace.store_category (store_cat_id, name, created_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (store_cat_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, store_cat_id, name, created_by
            ",
        )
        .bind(store_cat_id)
        .bind(name)
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    async fn store_category(
        &self,
        store_cat_id: i64,
    ) -> Result<Option<StoreCategory>, RepositoryError> {
        let category = sqlx::query_as::<_, StoreCategory>(
            r"
            SELECT id, store_cat_id, name, created_by
            FROM marketplace.store_category
            WHERE store_cat_id = $1
            ",
        )
        .bind(store_cat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn stores_in_category(
        &self,
        id: StoreCategoryId,
    ) -> Result<Vec<Store>, RepositoryError> {
        let stores = sqlx::query_as::<_, Store>(
            r"
            SELECT s.id, s.owner_id, s.name, s.address, s.url, s.nominal_delivery_price, s.status
            FROM marketplace.store s
            JOIN marketplace.store_category_member m ON m.store_id = s.id
            WHERE m.category_id = $1
            ORDER BY s.name
            ",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(stores)
    }

    async fn delete_store_category(&self, id: StoreCategoryId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM marketplace.store_category WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_database(e, |_| "Store category not empty".to_owned()))?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl ProductRepository for PgRepository {
    async fn upsert_product_category(
        &self,
        prod_cat_id: i64,
        name: &str,
    ) -> Result<ProductCategory, RepositoryError> {
        let category = sqlx::query_as::<_, ProductCategory>(
            r"
            INSERT INTO marketplace.product_category (prod_cat_id, name)
            VALUES ($1, $2)
            ON CONFLICT (prod_cat_id) DO UPDATE SET name = EXCLUDED.name
            RETURNING id, prod_cat_id, name
            ",
        )
        .bind(prod_cat_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    async fn product_category(
        &self,
        prod_cat_id: i64,
    ) -> Result<Option<ProductCategory>, RepositoryError> {
        let category = sqlx::query_as::<_, ProductCategory>(
            r"
            SELECT id, prod_cat_id, name
            FROM marketplace.product_category
            WHERE prod_cat_id = $1
            ",
        )
        .bind(prod_cat_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    async fn products_in_category(
        &self,
        id: ProductCategoryId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.category_id = $1 ORDER BY p.name");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn delete_product_category(
        &self,
        id: ProductCategoryId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM marketplace.product_category WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or_database(e, |_| "Product category not empty".to_owned()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn product_by_stock_number(
        &self,
        stock_number: StockNumber,
    ) -> Result<Option<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.stock_number = $1");
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(stock_number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    async fn search_products(&self, query: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            "{PRODUCT_SELECT}
            WHERE $1::text IS NULL
               OR strpos(lower(p.name), lower($1)) > 0
               OR strpos(lower(coalesce(p.model, '')), lower($1)) > 0
            ORDER BY p.name"
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(query)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn products_by_store(&self, store: StoreId) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!("{PRODUCT_SELECT} WHERE p.store_id = $1 ORDER BY p.stock_number");
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(store)
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    async fn upsert_product(&self, product: &ProductUpsert) -> Result<Product, RepositoryError> {
        // The WHERE clause turns an update of another store's product into "no row".
        let id: Option<ProductId> = sqlx::query_scalar(
            r"
            INSERT INTO marketplace.product
                (stock_number, slug, name, model, store_id, category_id, price,
                 recommended_price, weight_class, amount, description)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (stock_number) DO UPDATE SET
                name              = EXCLUDED.name,
                model             = EXCLUDED.model,
                category_id       = EXCLUDED.category_id,
                price             = EXCLUDED.price,
                recommended_price = EXCLUDED.recommended_price,
                weight_class      = EXCLUDED.weight_class,
                amount            = EXCLUDED.amount,
                description       = EXCLUDED.description
            WHERE marketplace.product.store_id = EXCLUDED.store_id
            RETURNING id
            ",
        )
        .bind(product.stock_number)
        .bind(product.stock_number.slug())
        .bind(&product.name)
        .bind(&product.model)
        .bind(product.store_id)
        .bind(product.category_id)
        .bind(product.price)
        .bind(product.recommended_price)
        .bind(product.weight_class)
        .bind(product.amount)
        .bind(&product.description)
        .fetch_optional(&self.pool)
        .await?;

        let Some(id) = id else {
            return Err(RepositoryError::Conflict(format!(
                "stock number {} belongs to another store",
                product.stock_number
            )));
        };

        let sql = format!("{PRODUCT_SELECT} WHERE p.id = $1");
        sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RepositoryError::DataCorruption(format!("product {id} vanished after upsert")))
    }

    async fn delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM marketplace.product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
