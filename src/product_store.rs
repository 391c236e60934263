use crate::config::DatabaseConfig;
use crate::error::ApiError;
use crate::product::{Product, ProductImage};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// A new image to persist alongside a product, already uploaded
#[derive(Debug, Clone)]
pub struct NewImage {
    pub url: String,
    pub content_type: String,
    pub object_key: String,
    pub size_bytes: i64,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    price: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ImageRow {
    product_id: Uuid,
    url: String,
    content_type: String,
    object_key: String,
    size_bytes: i64,
}

/// Persistence seam for product records
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Persist a product and its images; images keep submission order
    async fn insert_product(
        &self,
        name: &str,
        description: &str,
        price: i64,
        images: &[NewImage],
    ) -> Result<Product, ApiError>;

    /// Get a product by identifier
    async fn get(&self, id: Uuid) -> Result<Option<Product>, ApiError>;

    /// List products in creation order
    async fn list(&self, limit: Option<i64>, offset: Option<i64>)
        -> Result<Vec<Product>, ApiError>;

    /// Readiness probe against the backing store
    async fn ping(&self) -> Result<(), String>;
}

/// PostgreSQL-backed product store
pub struct ProductStore {
    pool: PgPool,
}

impl ProductStore {
    /// Create a new product store with connection pool
    pub async fn new(config: &DatabaseConfig, url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_secs)))
            .connect(url)
            .await
            .context("Failed to connect to PostgreSQL")?;

        info!("Connected to PostgreSQL database");

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run migrations")?;

        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ProductRepository for ProductStore {
    /// Persist a product and its images in one transaction.
    /// Images are stored in submission order.
    #[instrument(skip(self, images), fields(name = %name, image_count = images.len()))]
    async fn insert_product(
        &self,
        name: &str,
        description: &str,
        price: i64,
        images: &[NewImage],
    ) -> Result<Product, ApiError> {
        let product_id = Uuid::new_v4();
        let created_at = Utc::now();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ApiError::Persistence(format!("failed to begin transaction: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, price, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(product_id)
        .bind(name)
        .bind(description)
        .bind(price)
        .bind(created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::Persistence(format!("failed to insert product: {e}")))?;

        for (position, image) in images.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO product_images (
                    id, product_id, position, url, content_type, object_key, size_bytes
                ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(position as i32)
            .bind(&image.url)
            .bind(&image.content_type)
            .bind(&image.object_key)
            .bind(image.size_bytes)
            .execute(&mut *tx)
            .await
            .map_err(|e| ApiError::Persistence(format!("failed to insert product image: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| ApiError::Persistence(format!("failed to commit transaction: {e}")))?;

        debug!(product_id = %product_id, "product persisted");
        metrics::counter!("catalog.products.created").increment(1);

        Ok(Product {
            id: product_id,
            name: name.to_string(),
            description: description.to_string(),
            price,
            images: images
                .iter()
                .map(|i| ProductImage {
                    url: i.url.clone(),
                    content_type: i.content_type.clone(),
                    object_key: Some(i.object_key.clone()),
                    size_bytes: Some(i.size_bytes),
                })
                .collect(),
            created_at,
        })
    }

    /// Get a product by identifier, with its images in stored order
    async fn get(&self, id: Uuid) -> Result<Option<Product>, ApiError> {
        let row = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, description, price, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let images = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT product_id, url, content_type, object_key, size_bytes
            FROM product_images
            WHERE product_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(assemble(row, images)))
    }

    /// List products in creation order. `limit`/`offset` bound the page;
    /// both default to the whole store.
    #[instrument(skip(self))]
    async fn list(
        &self,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Product>, ApiError> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r#"
            SELECT id, name, description, price, created_at
            FROM products
            ORDER BY created_at ASC, id ASC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit.unwrap_or(i64::MAX))
        .bind(offset.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let image_rows = sqlx::query_as::<_, ImageRow>(
            r#"
            SELECT product_id, url, content_type, object_key, size_bytes
            FROM product_images
            WHERE product_id = ANY($1)
            ORDER BY product_id, position ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut products: Vec<Product> = rows
            .into_iter()
            .map(|r| assemble(r, Vec::new()))
            .collect();

        for image in image_rows {
            if let Some(product) = products.iter_mut().find(|p| p.id == image.product_id) {
                product.images.push(to_product_image(image));
            }
        }

        Ok(products)
    }

    async fn ping(&self) -> Result<(), String> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn assemble(row: ProductRow, images: Vec<ImageRow>) -> Product {
    Product {
        id: row.id,
        name: row.name,
        description: row.description,
        price: row.price,
        images: images.into_iter().map(to_product_image).collect(),
        created_at: row.created_at,
    }
}

fn to_product_image(row: ImageRow) -> ProductImage {
    ProductImage {
        url: row.url,
        content_type: row.content_type,
        object_key: Some(row.object_key),
        size_bytes: Some(row.size_bytes),
    }
}
