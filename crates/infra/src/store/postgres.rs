//! Postgres-backed store implementations.
//!
//! Both stores expose async inherent methods and implement the synchronous
//! store traits by blocking on a captured Tokio runtime handle. The cache
//! managers call stores from plain threads (the category refresh worker) or
//! from request handlers running under `spawn_blocking`; calling the trait
//! methods from inside an async task panics, as with any `Handle::block_on`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | `PoolTimedOut`, `PoolClosed`, `Io`, `Tls` | `Unavailable` |
//! | `ColumnNotFound`, `ColumnDecode`, `Decode`, `RowNotFound` | `Malformed` |
//! | anything else | `Query` |

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tokio::runtime::Handle;
use tracing::instrument;

use storefront_catalog::{CategoryRecord, NewProduct, Product};
use storefront_core::{CategoryId, ProductId};

use super::r#trait::{CategoryStore, ProductStore, StoreError};

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(format!("{operation}: {err}")),
        sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StoreError::Malformed(format!("{operation}: {err}")),
        other => StoreError::Query(format!("{operation}: {other}")),
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Postgres-backed category store (`categories` table).
#[derive(Debug, Clone)]
pub struct PostgresCategoryStore {
    pool: Arc<PgPool>,
    runtime: Handle,
}

impl PostgresCategoryStore {
    /// Create a store over `pool`; trait calls block on `runtime`.
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }

    /// Load one page of categories ordered by id.
    #[instrument(skip(self), err)]
    pub async fn load_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CategoryRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                parent_id,
                name,
                description,
                visible,
                weight
            FROM categories
            ORDER BY id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_category_page", e))?;

        rows.iter().map(category_from_row).collect()
    }
}

fn category_from_row(row: &PgRow) -> Result<CategoryRecord, StoreError> {
    let decode = |e| map_sqlx_error("decode_category", e);

    Ok(CategoryRecord {
        id: CategoryId::new(row.try_get("id").map_err(decode)?),
        parent_id: CategoryId::new(row.try_get("parent_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        visible: row.try_get("visible").map_err(decode)?,
        weight: row.try_get("weight").map_err(decode)?,
    })
}

impl CategoryStore for PostgresCategoryStore {
    fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<CategoryRecord>, StoreError> {
        self.runtime.block_on(self.load_page(offset, limit))
    }
}

/// Postgres-backed product store (`products` table).
#[derive(Debug, Clone)]
pub struct PostgresProductStore {
    pool: Arc<PgPool>,
    runtime: Handle,
}

impl PostgresProductStore {
    /// Create a store over `pool`; trait calls block on `runtime`.
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self {
            pool: Arc::new(pool),
            runtime,
        }
    }

    #[instrument(skip(self, product), fields(name = %product.name), err)]
    pub async fn insert_product(&self, product: NewProduct) -> Result<Product, StoreError> {
        let price = i64::try_from(product.price)
            .map_err(|_| StoreError::Malformed(format!("price {} out of range", product.price)))?;

        let row = sqlx::query(
            r#"
            INSERT INTO products (name, category, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&product.name)
        .bind(&product.category)
        .bind(price)
        .bind(product.created_at)
        .bind(product.updated_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("insert_product", e))?;

        Ok(product.with_id(ProductId::new(id)))
    }

    #[instrument(skip(self), err)]
    pub async fn load_all(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, category, price, created_at, updated_at
            FROM products
            ORDER BY id ASC
            LIMIT $1
            "#,
        )
        .bind(to_i64(limit))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_all_products", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn load_page(
        &self,
        name: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, category, price, created_at, updated_at
            FROM products
            WHERE ($1::text IS NULL OR name = $1)
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(name)
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_product_page", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self), err)]
    pub async fn count_matching(&self, name: Option<&str>) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM products
            WHERE ($1::text IS NULL OR name = $1)
            "#,
        )
        .bind(name)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_products", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error("count_products", e))?;

        u64::try_from(total).map_err(|_| StoreError::Malformed(format!("negative count {total}")))
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let decode = |e| map_sqlx_error("decode_product", e);

    let price: i64 = row.try_get("price").map_err(decode)?;
    let price = u64::try_from(price)
        .map_err(|_| StoreError::Malformed(format!("negative price {price}")))?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(decode)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(decode)?;

    Ok(Product {
        id: ProductId::new(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        category: row.try_get("category").map_err(decode)?,
        price,
        created_at,
        updated_at,
    })
}

impl ProductStore for PostgresProductStore {
    fn insert(&self, product: NewProduct) -> Result<Product, StoreError> {
        self.runtime.block_on(self.insert_product(product))
    }

    fn find_all(&self, limit: usize) -> Result<Vec<Product>, StoreError> {
        self.runtime.block_on(self.load_all(limit))
    }

    fn find_page(
        &self,
        name: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Product>, StoreError> {
        self.runtime.block_on(self.load_page(name, offset, limit))
    }

    fn count(&self, name: Option<&str>) -> Result<u64, StoreError> {
        self.runtime.block_on(self.count_matching(name))
    }
}
