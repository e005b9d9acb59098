//! # Stock Reports
//!
//! Read-only projections over products and the ledger: stock snapshot,
//! low-stock alerts and the per-product kardex. Each report reads inside one
//! transaction so product rows and movements come from the same snapshot.

use sqlx::SqlitePool;
use tracing::{debug, warn};

use gym_core::kardex::{self, Kardex, KardexSeed, StockSnapshot};
use gym_core::{Movement, Product, StockLevels};

use crate::error::{DbError, DbResult};
use crate::repository::stock::load_product;

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
    kardex_limit: u32,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool, kardex_limit: u32) -> Self {
        ReportRepository { pool, kardex_limit }
    }

    /// Current stock of every product, active ones first, by name.
    pub async fn stock_snapshot(&self) -> DbResult<Vec<StockSnapshot>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products ORDER BY is_active DESC, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products.iter().map(StockSnapshot::from).collect())
    }

    /// Current stock of one product.
    pub async fn product_stock(&self, product_id: &str) -> DbResult<StockSnapshot> {
        let mut conn = self.pool.acquire().await?;
        let product = load_product(&mut conn, product_id).await?;
        Ok(StockSnapshot::from(&product))
    }

    /// Active products below `min_stock` at either location.
    pub async fn low_stock(&self) -> DbResult<Vec<StockSnapshot>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_active = 1
              AND (stock_gym < min_stock OR stock_warehouse < min_stock)
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Low-stock products");
        Ok(kardex::low_stock(&products))
    }

    /// The last `limit` movements of a product (configured default when
    /// `None`) with running balances back-computed from live stock.
    pub async fn kardex(&self, product_id: &str, limit: Option<u32>) -> DbResult<Kardex> {
        let limit = limit.unwrap_or(self.kardex_limit);

        let mut tx = self.pool.begin().await?;

        let product = load_product(&mut tx, product_id).await?;
        let mut movements = sqlx::query_as::<_, Movement>(
            r#"
            SELECT * FROM movements
            WHERE product_id = ?1
            ORDER BY occurred_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        movements.reverse();
        debug!(product_id = %product_id, movements = movements.len(), "Kardex window");

        Ok(kardex::project(product_id, movements, KardexSeed::Live(product.stock())))
    }

    /// The whole history of a product replayed from zero.
    pub async fn full_kardex(&self, product_id: &str) -> DbResult<Kardex> {
        let mut tx = self.pool.begin().await?;

        let product = load_product(&mut tx, product_id).await?;
        let movements = sqlx::query_as::<_, Movement>(
            "SELECT * FROM movements WHERE product_id = ?1 ORDER BY occurred_at, rowid",
        )
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let kardex = kardex::project(product_id, movements, KardexSeed::Opening(StockLevels::default()));

        if kardex.closing != product.stock() {
            warn!(
                product_id = %product_id,
                replayed = ?kardex.closing,
                stock = ?product.stock(),
                "Ledger replay disagrees with stock columns"
            );
            return Err(DbError::Internal(format!(
                "ledger replay for product {} does not match stored stock",
                product_id
            )));
        }

        Ok(kardex)
    }
}
