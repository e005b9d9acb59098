//! # Kardex Projection
//!
//! Read-only views derived from the ledger: per-product movement history
//! with running balances, and the stock snapshot rows used for low-stock
//! alerts. Nothing here has state of its own.
//!
//! ## Seeding the Running Balance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Full ledger retained            │  Only the last N movements          │
//! │  ─────────────────────           │  ─────────────────────────          │
//! │  opening = 0 (products start     │  opening = live stock               │
//! │  with zero stock) or any         │            − Σ retained deltas      │
//! │  explicit balance                │                                     │
//! │                                  │                                     │
//! │  balance[i] = balance[i-1] + delta[i]                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every row's delta is applied. A cancelled sale and its compensating
//! entry cancel each other out, so the last balance always equals live
//! stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{Movement, Product, ProductCategory, StockLevels};

// =============================================================================
// Kardex
// =============================================================================

/// Where the running balance starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KardexSeed {
    /// Balance before the first movement passed in.
    Opening(StockLevels),
    /// Live stock after the last movement passed in; the opening balance is
    /// back-computed.
    Live(StockLevels),
}

/// One kardex line: the movement and the balances right after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct KardexEntry {
    pub movement: Movement,
    pub balance: StockLevels,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Kardex {
    pub product_id: String,
    pub opening: StockLevels,
    /// Oldest first.
    pub entries: Vec<KardexEntry>,
    pub closing: StockLevels,
}

/// Builds a kardex from movements in chronological order (oldest first).
///
/// ```rust
/// use gym_core::kardex::{project, KardexSeed};
/// use gym_core::StockLevels;
///
/// let kardex = project("p-1", Vec::new(), KardexSeed::Live(StockLevels::new(4, 6)));
/// assert_eq!(kardex.opening, kardex.closing);
/// ```
pub fn project(product_id: impl Into<String>, movements: Vec<Movement>, seed: KardexSeed) -> Kardex {
    let opening = match seed {
        KardexSeed::Opening(levels) => levels,
        KardexSeed::Live(live) => {
            let mut levels = live;
            for movement in &movements {
                levels.apply(movement.location, movement.quantity.saturating_neg());
            }
            levels
        }
    };

    let mut balance = opening;
    let entries = movements
        .into_iter()
        .map(|movement| {
            balance.apply(movement.location, movement.quantity);
            KardexEntry { movement, balance }
        })
        .collect();

    Kardex {
        product_id: product_id.into(),
        opening,
        entries,
        closing: balance,
    }
}

// =============================================================================
// Stock Snapshot
// =============================================================================

/// Current stock of one product, as shown on stock and low-stock reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockSnapshot {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub category: ProductCategory,
    pub gym: i64,
    pub warehouse: i64,
    pub total: i64,
    pub min_stock: i64,
    pub is_active: bool,
    pub is_low: bool,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl From<&Product> for StockSnapshot {
    fn from(product: &Product) -> Self {
        StockSnapshot {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            category: product.category,
            gym: product.stock_gym,
            warehouse: product.stock_warehouse,
            total: product.total_stock(),
            min_stock: product.min_stock,
            is_active: product.is_active,
            is_low: product.is_low_stock(),
            updated_at: product.updated_at,
        }
    }
}

/// Active products below `min_stock` at either location.
pub fn low_stock<'a>(products: impl IntoIterator<Item = &'a Product>) -> Vec<StockSnapshot> {
    products
        .into_iter()
        .filter(|p| p.is_low_stock())
        .map(StockSnapshot::from)
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
