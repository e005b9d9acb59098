//! # Error Types
//!
//! Domain-specific error types for gym-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  gym-core errors (this file)                                           │
//! │  ├── CoreError        - Ledger / shift rule violations                 │
//! │  └── ValidationError  - Catalog field validation failures              │
//! │                                                                         │
//! │  gym-db errors (separate crate)                                        │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant carries enough context (ids, quantities, amounts) for the
//! presentation layer to render a message without another lookup.

use thiserror::Error;

use crate::types::{Location, MovementType};

// =============================================================================
// Core Error
// =============================================================================

/// Ledger and shift rule violations.
///
/// All of these are detected before anything is committed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A quantity that must be positive (or non-zero for adjustments) was not.
    #[error("Invalid quantity: {quantity}")]
    InvalidQuantity { quantity: i64 },

    /// The operation would drive a location's stock below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 3 shakes at GYM
    ///      │
    ///      ▼
    /// Guarded update: stock_gym = 2
    ///      │
    ///      ▼
    /// InsufficientStock { location: Gym, available: 2, requested: 3 }
    ///      │
    ///      ▼
    /// UI shows: "Only 2 in stock at the gym floor"
    /// ```
    #[error(
        "Insufficient stock for product {product_id} at {location}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        product_id: String,
        location: Location,
        available: i64,
        requested: i64,
    },

    /// The computed sale total (price × qty − discount + surcharge) is negative.
    #[error("Invalid sale total: {total_cents} cents")]
    InvalidTotal { total_cents: i64 },

    /// A computed amount does not fit in the money type.
    #[error("{field} is too large")]
    AmountOverflow { field: String },

    /// A monetary input that must be non-negative was negative.
    #[error("{field} cannot be negative: {cents} cents")]
    InvalidAmount { field: String, cents: i64 },

    /// Adjustments and cancellations require a written reason.
    #[error("A justification is required for this operation")]
    MissingJustification,

    /// Unknown movement, shift or product id.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The sale movement is already flagged as cancelled.
    #[error("Movement {movement_id} is already cancelled")]
    AlreadyCancelled { movement_id: String },

    /// The shift already has a closing timestamp.
    #[error("Shift {shift_id} is already closed")]
    AlreadyClosed { shift_id: String },

    /// Another shift is open somewhere in the system.
    #[error("Shift {folio} is already open")]
    ShiftAlreadyOpen { folio: String },

    /// A sale was attempted while no shift is open.
    #[error("No shift is open")]
    NoOpenShift,

    /// Cancellation attempted on a movement that is not a sale.
    #[error("Movement {movement_id} is a {movement_type}, not a sale")]
    NotASale {
        movement_id: String,
        movement_type: MovementType,
    },

    /// A transfer whose source and destination are the same location.
    #[error("Cannot transfer from {location} to itself")]
    InvalidTransfer { location: Location },

    /// Sale of a soft-deactivated product.
    #[error("Product {product_id} is inactive")]
    ProductInactive { product_id: String },

    /// The caller supplied no authenticated user identity.
    #[error("Unauthorized: an authenticated user is required")]
    Unauthorized,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an InvalidAmount error for a named field.
    pub fn invalid_amount(field: impl Into<String>, cents: i64) -> Self {
        CoreError::InvalidAmount {
            field: field.into(),
            cents,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Catalog input validation errors (SKU, names, prices).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID, bad SKU characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
