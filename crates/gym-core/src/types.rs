//! # Domain Types
//!
//! Core domain types of the inventory ledger and the cash register.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Movement     │   │     Shift       │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │◄──│  product_id     │   │  id (UUID)      │       │
//! │  │  sku (business) │   │  movement_type  │──►│  folio          │       │
//! │  │  category       │   │  location       │   │  opened_at      │       │
//! │  │  stock_gym      │   │  quantity (±)   │   │  closed_at?     │       │
//! │  │  stock_warehouse│   │  shift_id?      │   │  difference?    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Location     │   │  MovementType   │   │ PaymentMethod   │       │
//! │  │  Gym            │   │  Sale  Entry    │   │  Cash           │       │
//! │  │  Warehouse      │   │  TransferIn/Out │   │  Debit  Credit  │       │
//! │  └─────────────────┘   │  Adjustment     │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! - `id`: UUID v4, immutable, used for relations
//! - Business id: `sku` for products, `folio` for shifts, `ticket_id` for
//!   checkouts (a plain correlation key, there is no ticket table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Location
// =============================================================================

/// The two stock locations. There are exactly two; the schema has one stock
/// column per location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// Sales floor.
    Gym,
    /// Back storage.
    Warehouse,
}

impl Location {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Location::Gym => "gym",
            Location::Warehouse => "warehouse",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Movement Type
// =============================================================================

/// Kind of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Point-of-sale line (negative delta, tagged with a shift).
    Sale,
    /// Goods received, or the compensating row of a cancelled sale.
    Entry,
    /// Arrival side of a transfer.
    TransferIn,
    /// Departure side of a transfer.
    TransferOut,
    /// Manual correction with a mandatory reason.
    Adjustment,
}

impl MovementType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MovementType::Sale => "sale",
            MovementType::Entry => "entry",
            MovementType::TransferIn => "transfer_in",
            MovementType::TransferOut => "transfer_out",
            MovementType::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash into the drawer.
    Cash,
    /// Debit card voucher.
    Debit,
    /// Credit card voucher.
    Credit,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [PaymentMethod::Cash, PaymentMethod::Debit, PaymentMethod::Credit];
}

// =============================================================================
// Product Category
// =============================================================================

/// Explicit, stored product classification.
///
/// Whether something is a membership is decided by this field alone, never
/// by looking at the product name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Membership,
    Supplement,
    Beverage,
    Snack,
    Apparel,
    Accessory,
    #[default]
    Other,
}

impl ProductCategory {
    #[inline]
    pub const fn is_membership(&self) -> bool {
        matches!(self, ProductCategory::Membership)
    }
}

// =============================================================================
// Stock Levels
// =============================================================================

/// Quantities at both locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockLevels {
    pub gym: i64,
    pub warehouse: i64,
}

impl StockLevels {
    pub const fn new(gym: i64, warehouse: i64) -> Self {
        StockLevels { gym, warehouse }
    }

    #[inline]
    pub const fn get(&self, location: Location) -> i64 {
        match location {
            Location::Gym => self.gym,
            Location::Warehouse => self.warehouse,
        }
    }

    #[inline]
    pub const fn total(&self) -> i64 {
        self.gym + self.warehouse
    }

    /// Adds a signed delta at one location.
    pub fn apply(&mut self, location: Location, delta: i64) {
        match location {
            Location::Gym => self.gym = self.gym.saturating_add(delta),
            Location::Warehouse => self.warehouse = self.warehouse.saturating_add(delta),
        }
    }

    pub const fn is_non_negative(&self) -> bool {
        self.gym >= 0 && self.warehouse >= 0
    }
}

// =============================================================================
// Product
// =============================================================================

/// A sellable item with stock at two locations.
///
/// Stock columns are written only by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name.
    pub name: String,

    pub category: ProductCategory,

    /// Sale price in cents.
    pub price_cents: i64,

    pub stock_warehouse: i64,

    pub stock_gym: i64,

    /// Threshold under which a location is reported as low.
    pub min_stock: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Bumped on every row change.
    pub version: i64,
}

impl Product {
    #[inline]
    pub fn stock(&self) -> StockLevels {
        StockLevels::new(self.stock_gym, self.stock_warehouse)
    }

    #[inline]
    pub fn stock_at(&self, location: Location) -> i64 {
        self.stock().get(location)
    }

    #[inline]
    pub fn total_stock(&self) -> i64 {
        self.stock().total()
    }

    /// Active and below `min_stock` at either location.
    pub fn is_low_stock(&self) -> bool {
        self.is_active && (self.stock_gym < self.min_stock || self.stock_warehouse < self.min_stock)
    }
}

/// Catalog data for a new product. Stock always starts at zero.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category: ProductCategory,
    pub price_cents: i64,
    pub min_stock: i64,
}

/// Editable catalog fields. Stock is not among them.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductUpdate {
    pub name: String,
    pub category: ProductCategory,
    pub price_cents: i64,
    pub min_stock: i64,
}

// =============================================================================
// Movement
// =============================================================================

/// One immutable ledger row.
///
/// Only the cancellation overlay (`is_cancelled`, `cancellation_reason`,
/// `cancelled_at`, `cancelled_by`) is ever written after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Movement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    pub location: Location,

    /// Signed stock delta at `location`.
    pub quantity: i64,

    /// Product category at the time of the movement.
    pub category: ProductCategory,

    /// Groups the lines of one checkout.
    pub ticket_id: Option<String>,
    pub member_id: Option<String>,
    pub user_id: String,

    // Sale-only amounts
    pub unit_price_cents: Option<i64>,
    pub subtotal_cents: Option<i64>,
    pub discount_cents: Option<i64>,
    pub surcharge_cents: Option<i64>,
    pub total_cents: Option<i64>,
    pub payment_method: Option<PaymentMethod>,

    pub shift_id: Option<String>,

    /// Shared by the TRANSFER_OUT / TRANSFER_IN pair.
    pub transfer_id: Option<String>,

    /// Set on the compensating entry of a cancelled sale.
    pub reverses_movement_id: Option<String>,

    pub notes: Option<String>,

    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<String>,

    #[ts(as = "String")]
    pub occurred_at: DateTime<Utc>,
}

impl Movement {
    #[inline]
    pub fn is_sale(&self) -> bool {
        self.movement_type == MovementType::Sale
    }

    /// Sale total, zero for rows that carry no amounts.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents.unwrap_or(0))
    }

    /// Units sold / moved, regardless of direction.
    #[inline]
    pub fn units(&self) -> i64 {
        self.quantity.abs()
    }
}

// =============================================================================
// Shift
// =============================================================================

/// Lifecycle state, derived from `closed_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

/// A cash-register shift ("corte").
///
/// Closing fields are `None` until the single close transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shift {
    pub id: String,
    pub folio: String,
    pub cashier_id: String,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
    pub opening_cash_cents: i64,

    pub ticket_count: Option<i64>,
    pub total_sales_cents: Option<i64>,
    pub sales_cash_cents: Option<i64>,
    pub sales_debit_cents: Option<i64>,
    pub sales_credit_cents: Option<i64>,
    pub sales_memberships_cents: Option<i64>,
    pub sales_products_cents: Option<i64>,
    pub counted_cash_cents: Option<i64>,
    pub counted_debit_cents: Option<i64>,
    pub counted_credit_cents: Option<i64>,
    pub total_withdrawals_cents: Option<i64>,
    pub withdrawals_concept: Option<String>,
    pub total_cash_in_drawer_cents: Option<i64>,
    pub expected_cash_in_drawer_cents: Option<i64>,
    pub difference_cents: Option<i64>,
    pub notes: Option<String>,
    pub closed_by: Option<String>,
}

impl Shift {
    pub fn status(&self) -> ShiftStatus {
        if self.closed_at.is_some() {
            ShiftStatus::Closed
        } else {
            ShiftStatus::Open
        }
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.status() == ShiftStatus::Open
    }

    #[inline]
    pub fn opening_cash(&self) -> Money {
        Money::from_cents(self.opening_cash_cents)
    }
}

/// Amounts the cashier counted at close, per payment method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountedCash {
    pub cash: Money,
    pub debit: Money,
    pub credit: Money,
}

impl CountedCash {
    pub const fn new(cash: Money, debit: Money, credit: Money) -> Self {
        CountedCash { cash, debit, credit }
    }

    /// Cash only, no card vouchers.
    pub const fn cash_only(cash: Money) -> Self {
        CountedCash {
            cash,
            debit: Money::zero(),
            credit: Money::zero(),
        }
    }

    pub fn get(&self, method: PaymentMethod) -> Money {
        match method {
            PaymentMethod::Cash => self.cash,
            PaymentMethod::Debit => self.debit,
            PaymentMethod::Credit => self.credit,
        }
    }

    pub fn total(&self) -> Money {
        self.cash + self.debit + self.credit
    }
}

/// Closing input for a shift.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShiftClose {
    pub counted: CountedCash,
    pub total_withdrawals: Money,
    pub withdrawals_concept: Option<String>,
    pub notes: Option<String>,
}

/// Persisted per-category sales of a closed shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ShiftCategoryTotal {
    pub shift_id: String,
    pub category: ProductCategory,
    pub total_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(gym: i64, warehouse: i64, min: i64, active: bool) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            sku: "WHEY-1KG".to_string(),
            name: "Whey 1kg".to_string(),
            category: ProductCategory::Supplement,
            price_cents: 89_900,
            stock_warehouse: warehouse,
            stock_gym: gym,
            min_stock: min,
            is_active: active,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    #[test]
    fn test_low_stock_either_location() {
        assert!(product(1, 10, 3, true).is_low_stock());
        assert!(product(10, 1, 3, true).is_low_stock());
        assert!(!product(3, 3, 3, true).is_low_stock());
        // Inactive products never alert
        assert!(!product(0, 0, 3, false).is_low_stock());
    }

    #[test]
    fn test_stock_levels_apply() {
        let mut levels = StockLevels::new(2, 5);
        levels.apply(Location::Warehouse, -3);
        levels.apply(Location::Gym, 3);
        assert_eq!(levels, StockLevels::new(5, 2));
        assert_eq!(levels.total(), 7);
        assert!(levels.is_non_negative());
    }

    #[test]
    fn test_membership_is_explicit() {
        assert!(ProductCategory::Membership.is_membership());
        assert!(!ProductCategory::Supplement.is_membership());
        assert_eq!(ProductCategory::default(), ProductCategory::Other);
    }

    #[test]
    fn test_counted_cash_total() {
        let counted = CountedCash::new(Money::from_major(100), Money::from_major(50), Money::from_cents(25));
        assert_eq!(counted.total().cents(), 15_025);
        assert_eq!(counted.get(PaymentMethod::Debit), Money::from_major(50));
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_string(&MovementType::TransferOut).unwrap(),
            "\"transfer_out\""
        );
        assert_eq!(serde_json::to_string(&Location::Warehouse).unwrap(), "\"warehouse\"");
        assert_eq!(MovementType::Adjustment.to_string(), "adjustment");
    }
}
