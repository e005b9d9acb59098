//! # Product Repository
//!
//! Catalog operations for products.
//!
//! ## Key Operations
//! - Create (always active, zero stock)
//! - Lookup by id / SKU, name or SKU search
//! - Catalog edits (name, category, price, min stock)
//! - Soft deactivation / reactivation
//!
//! Stock columns are absent from every write here; they move
//! only through the ledger (see [`super::stock`]).

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use gym_core::validation::{validate_min_stock, validate_price_cents, validate_product_name, validate_sku};
use gym_core::{CoreError, NewProduct, Product, ProductUpdate};

use crate::error::{is_unique_violation, DbError, DbResult};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let results = repo.search("whey", 20).await?;
/// let product = repo.get_by_sku("WHEY-1KG").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a new product with zero stock at both locations.
    ///
    /// ## Returns
    /// * `Ok(Product)` - The stored product
    /// * `Err(DbError::Domain(Validation))` - Bad catalog field
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn create(&self, new: &NewProduct) -> DbResult<Product> {
        let sku = new.sku.trim();
        let name = new.name.trim();

        validate_sku(sku).map_err(CoreError::from)?;
        validate_product_name(name).map_err(CoreError::from)?;
        validate_price_cents(new.price_cents).map_err(CoreError::from)?;
        validate_min_stock(new.min_stock).map_err(CoreError::from)?;

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: name.to_string(),
            category: new.category,
            price_cents: new.price_cents,
            stock_warehouse: 0,
            stock_gym: 0,
            min_stock: new.min_stock,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        };

        debug!(sku = %product.sku, category = ?product.category, "Inserting product");

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category, price_cents,
                stock_warehouse, stock_gym, min_stock,
                is_active, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, 1, ?7, ?8, 0)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.category)
        .bind(product.price_cents)
        .bind(product.min_stock)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                info!(id = %product.id, sku = %product.sku, "Product created");
                Ok(product)
            }
            Err(err) if is_unique_violation(&err) => Err(DbError::duplicate("sku", sku)),
            Err(err) => Err(err.into()),
        }
    }

    /// Searches active products by SKU or name (case-insensitive substring).
    ///
    /// An empty query lists active products by name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Product>> {
        let query = query.trim();

        debug!(query = %query, limit = %limit, "Searching products");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let pattern = format!("%{}%", escape_like(query));

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1
              AND (sku LIKE ?1 ESCAPE '\' OR name LIKE ?1 ESCAPE '\')
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Lists active products sorted by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE sku = ?1")
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    /// Edits catalog fields. Stock is untouched.
    pub async fn update_details(&self, id: &str, update: &ProductUpdate) -> DbResult<Product> {
        let name = update.name.trim();

        validate_product_name(name).map_err(CoreError::from)?;
        validate_price_cents(update.price_cents).map_err(CoreError::from)?;
        validate_min_stock(update.min_stock).map_err(CoreError::from)?;

        debug!(id = %id, "Updating product details");

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                name = ?2,
                category = ?3,
                price_cents = ?4,
                min_stock = ?5,
                updated_at = ?6,
                version = version + 1
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(update.category)
        .bind(update.price_cents)
        .bind(update.min_stock)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or_else(|| CoreError::not_found("Product", id).into())
    }

    /// Hides a product from sale. History and stock are kept.
    pub async fn deactivate(&self, id: &str) -> DbResult<Product> {
        info!(id = %id, "Deactivating product");
        self.set_active(id, false).await
    }

    /// Makes a deactivated product sellable again.
    pub async fn reactivate(&self, id: &str) -> DbResult<Product> {
        info!(id = %id, "Reactivating product");
        self.set_active(id, true).await
    }

    async fn set_active(&self, id: &str, active: bool) -> DbResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET
                is_active = ?2,
                updated_at = ?3,
                version = version + 1
            WHERE id = ?1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        product.ok_or_else(|| CoreError::not_found("Product", id).into())
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Helper to generate a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// =============================================================================
// Unit Tests
// =============================================================================
