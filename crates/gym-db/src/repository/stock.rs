//! # Stock Store
//!
//! The only code that writes `products.stock_gym` / `products.stock_warehouse`.
//! Every function takes a connection that is already inside the caller's
//! transaction, so the stock change commits or rolls back together with its
//! ledger row.
//!
//! ## Guarded Update
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE products                                                        │
//! │     SET stock_gym = stock_gym + Δ                                       │
//! │   WHERE id = ? AND stock_gym + Δ >= 0                                   │
//! │  RETURNING stock_gym, stock_warehouse, category                         │
//! │                                                                         │
//! │  row returned  → applied, new levels known                              │
//! │  no row        → product missing (NotFound) or would go negative        │
//! │                  (InsufficientStock); nothing was written               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Check and write are one statement, so two registers selling the last unit
//! cannot both succeed.

use chrono::Utc;
use sqlx::SqliteConnection;
use tracing::debug;

use gym_core::{CoreError, Location, Product, ProductCategory, StockLevels};

use crate::error::DbResult;

/// Result of a successful guarded update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StockChange {
    pub levels: StockLevels,
    /// Category at the time of the change, snapshotted onto the movement.
    pub category: ProductCategory,
}

const APPLY_GYM: &str = r#"
    UPDATE products
       SET stock_gym = stock_gym + ?1,
           updated_at = ?2,
           version = version + 1
     WHERE id = ?3 AND stock_gym + ?1 >= 0
    RETURNING stock_gym, stock_warehouse, category
"#;

const APPLY_WAREHOUSE: &str = r#"
    UPDATE products
       SET stock_warehouse = stock_warehouse + ?1,
           updated_at = ?2,
           version = version + 1
     WHERE id = ?3 AND stock_warehouse + ?1 >= 0
    RETURNING stock_gym, stock_warehouse, category
"#;

/// Loads a product or fails with a domain `NotFound`.
pub(crate) async fn load_product(conn: &mut SqliteConnection, product_id: &str) -> DbResult<Product> {
    let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ?1")
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    product.ok_or_else(|| CoreError::not_found("Product", product_id).into())
}

/// Adds `delta` to the stock at `location`.
///
/// ## Errors
/// - `NotFound` when the product does not exist
/// - `InsufficientStock` when the result would be negative
pub(crate) async fn apply_delta(
    conn: &mut SqliteConnection,
    product_id: &str,
    location: Location,
    delta: i64,
) -> DbResult<StockChange> {
    let sql = match location {
        Location::Gym => APPLY_GYM,
        Location::Warehouse => APPLY_WAREHOUSE,
    };

    let row = sqlx::query_as::<_, (i64, i64, ProductCategory)>(sql)
        .bind(delta)
        .bind(Utc::now())
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some((gym, warehouse, category)) => {
            debug!(product_id = %product_id, %location, delta, gym, warehouse, "Stock updated");
            Ok(StockChange {
                levels: StockLevels::new(gym, warehouse),
                category,
            })
        }
        None => {
            // Guard rejected the row; find out why
            let product = load_product(conn, product_id).await?;
            debug!(
                product_id = %product_id,
                %location,
                delta,
                available = product.stock_at(location),
                "Stock guard rejected update"
            );
            Err(CoreError::InsufficientStock {
                product_id: product_id.to_string(),
                location,
                available: product.stock_at(location),
                requested: delta.saturating_neg(),
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use gym_core::NewProduct;

    async fn setup() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create(&NewProduct {
                sku: "SHAKER-700".to_string(),
                name: "Shaker 700ml".to_string(),
                category: ProductCategory::Accessory,
                price_cents: 15_000,
                min_stock: 2,
            })
            .await
            .unwrap();
        (db, product)
    }

    #[tokio::test]
    async fn test_apply_delta_updates_one_location() {
        let (db, product) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let change = apply_delta(&mut conn, &product.id, Location::Warehouse, 7).await.unwrap();
        assert_eq!(change.levels, StockLevels::new(0, 7));
        assert_eq!(change.category, ProductCategory::Accessory);

        let change = apply_delta(&mut conn, &product.id, Location::Warehouse, -7).await.unwrap();
        assert_eq!(change.levels, StockLevels::new(0, 0));
    }

    #[tokio::test]
    async fn test_guard_rejects_negative_result() {
        let (db, product) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        apply_delta(&mut conn, &product.id, Location::Gym, 2).await.unwrap();

        let err = apply_delta(&mut conn, &product.id, Location::Gym, -3).await.unwrap_err();
        assert_eq!(
            err.as_domain(),
            Some(&CoreError::InsufficientStock {
                product_id: product.id.clone(),
                location: Location::Gym,
                available: 2,
                requested: 3,
            })
        );

        let reloaded = load_product(&mut conn, &product.id).await.unwrap();
        assert_eq!(reloaded.stock_gym, 2);
    }

    #[tokio::test]
    async fn test_guard_rejects_most_negative_delta() {
        let (db, product) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();
        apply_delta(&mut conn, &product.id, Location::Gym, 2).await.unwrap();

        let err = apply_delta(&mut conn, &product.id, Location::Gym, i64::MIN).await.unwrap_err();
        assert!(matches!(
            err.as_domain(),
            Some(CoreError::InsufficientStock { available: 2, requested: i64::MAX, .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let (db, _) = setup().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let err = apply_delta(&mut conn, "missing", Location::Gym, 1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::NotFound { .. })
        ));
    }
}
