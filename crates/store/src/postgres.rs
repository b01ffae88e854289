//! PostgreSQL-backed store implementations.
//!
//! Orders are persisted as whole JSONB documents with a version column
//! for optimistic concurrency; a status change and its timeline entry
//! therefore always land in one atomic row update. Variant stock lives
//! in its own table so reservations can run as a single conditional
//! `UPDATE ... WHERE stock >= quantity`.

use async_trait::async_trait;
use common::{OrderId, ProductId};
use domain::{Order, Product, ProductImage, Variant};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{OrderFilter, OrderStore, Page, ProductStore, Result, StoreError};

/// PostgreSQL order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let document: serde_json::Value = row.try_get("document")?;
        let version: i64 = row.try_get("version")?;
        let mut order: Order = serde_json::from_value(document)?;
        order.set_version(version);
        Ok(order)
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let document = serde_json::to_value(order)?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, order_number, customer_id, status, document, version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.order_number().as_str())
        .bind(order.customer().as_uuid())
        .bind(order.status().as_str())
        .bind(&document)
        .bind(order.version())
        .bind(order.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateOrder(order.order_number().to_string());
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn update(&self, order: &mut Order) -> Result<()> {
        let expected = order.version();
        order.set_version(expected + 1);
        let document = serde_json::to_value(&*order)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET document = $2, status = $3, version = $4
            WHERE id = $1 AND version = $5
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(&document)
        .bind(order.status().as_str())
        .bind(expected + 1)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(order_id = %order.id(), expected, "order update hit a stale version");
            // Roll the in-memory version back before reporting.
            order.set_version(expected);

            let actual: Option<i64> =
                sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                    .bind(order.id().as_uuid())
                    .fetch_optional(&self.pool)
                    .await?;

            return match actual {
                Some(actual) => Err(StoreError::VersionConflict {
                    order_id: order.id(),
                    expected,
                    actual,
                }),
                None => Err(StoreError::OrderNotFound(order.id())),
            };
        }

        Ok(())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT document, version FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn get_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT document, version FROM orders WHERE order_number = $1")
            .bind(order_number)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn list(&self, filter: &OrderFilter, page: Page) -> Result<(Vec<Order>, u64)> {
        let mut where_clause = String::from(" WHERE 1=1");
        let mut param_count = 0;

        if filter.status.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND status = ${param_count}"));
        }
        if filter.customer.is_some() {
            param_count += 1;
            where_clause.push_str(&format!(" AND customer_id = ${param_count}"));
        }

        let count_sql = format!("SELECT COUNT(*) FROM orders{where_clause}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(status) = filter.status {
            count_query = count_query.bind(status.as_str());
        }
        if let Some(customer) = filter.customer {
            count_query = count_query.bind(customer.as_uuid());
        }
        let total: i64 = count_query.fetch_one(&self.pool).await?;

        let list_sql = format!(
            "SELECT document, version FROM orders{where_clause} \
             ORDER BY created_at DESC LIMIT ${} OFFSET ${}",
            param_count + 1,
            param_count + 2
        );
        let mut list_query = sqlx::query(&list_sql);
        if let Some(status) = filter.status {
            list_query = list_query.bind(status.as_str());
        }
        if let Some(customer) = filter.customer {
            list_query = list_query.bind(customer.as_uuid());
        }
        let rows = list_query
            .bind(i64::from(page.size))
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        let orders = rows
            .into_iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        Ok((orders, total as u64))
    }

    async fn next_order_sequence(&self) -> Result<u64> {
        let value: i64 = sqlx::query_scalar("SELECT nextval('order_numbers')")
            .fetch_one(&self.pool)
            .await?;
        Ok(value as u64)
    }
}

/// PostgreSQL product store.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    /// Creates a new PostgreSQL product store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn variant_stock(&self, product_id: ProductId, size: &str) -> Result<Option<u32>> {
        let stock: Option<i32> = sqlx::query_scalar(
            "SELECT stock FROM product_variants WHERE product_id = $1 AND size = $2",
        )
        .bind(product_id.as_uuid())
        .bind(size)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stock.map(|s| s as u32))
    }

    /// Distinguishes a missing product from a missing size after a
    /// zero-row conditional update.
    async fn missing_variant_error(&self, product_id: ProductId, size: &str) -> StoreError {
        let exists: std::result::Result<Option<Uuid>, sqlx::Error> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = $1")
                .bind(product_id.as_uuid())
                .fetch_optional(&self.pool)
                .await;

        match exists {
            Ok(Some(_)) => StoreError::VariantNotFound {
                product_id,
                size: size.to_string(),
            },
            Ok(None) => StoreError::ProductNotFound(product_id),
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn insert(&self, product: &Product) -> Result<()> {
        let images = serde_json::to_value(&product.images)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, is_active, images)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product.id.as_uuid())
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(product.is_active)
        .bind(&images)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateProduct(product.id);
            }
            StoreError::Database(e)
        })?;

        for variant in &product.variants {
            sqlx::query(
                r#"
                INSERT INTO product_variants (product_id, size, stock, sku)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(product.id.as_uuid())
            .bind(&variant.size)
            .bind(variant.stock as i32)
            .bind(&variant.sku)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    return StoreError::DuplicateSku(variant.sku.clone());
                }
                StoreError::Database(e)
            })?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, is_active, images FROM products WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let images: serde_json::Value = row.try_get("images")?;
        let images: Vec<ProductImage> = serde_json::from_value(images)?;

        let variant_rows = sqlx::query(
            "SELECT size, stock, sku FROM product_variants WHERE product_id = $1 ORDER BY size",
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        let variants = variant_rows
            .into_iter()
            .map(|v| {
                Ok(Variant {
                    size: v.try_get("size")?,
                    stock: v.try_get::<i32, _>("stock")? as u32,
                    sku: v.try_get("sku")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Product {
            id,
            name: row.try_get("name")?,
            price: domain::Money::from_cents(row.try_get("price_cents")?),
            is_active: row.try_get("is_active")?,
            images,
            variants,
        }))
    }

    async fn stock(&self, product_id: ProductId, size: &str) -> Result<u32> {
        match self.variant_stock(product_id, size).await? {
            Some(stock) => Ok(stock),
            None => Err(self.missing_variant_error(product_id, size).await),
        }
    }

    async fn reserve_stock(
        &self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<()> {
        // Conditional decrement in one statement: either the full quantity
        // is taken or nothing is.
        let result = sqlx::query(
            r#"
            UPDATE product_variants
            SET stock = stock - $3
            WHERE product_id = $1 AND size = $2 AND stock >= $3
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(size)
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.variant_stock(product_id, size).await? {
                Some(available) => Err(StoreError::InsufficientStock {
                    product_id,
                    size: size.to_string(),
                    requested: quantity,
                    available,
                }),
                None => Err(self.missing_variant_error(product_id, size).await),
            };
        }

        Ok(())
    }

    async fn release_stock(
        &self,
        product_id: ProductId,
        size: &str,
        quantity: u32,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE product_variants
            SET stock = stock + $3
            WHERE product_id = $1 AND size = $2
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(size)
        .bind(quantity as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.missing_variant_error(product_id, size).await);
        }

        Ok(())
    }
}
