//! # Validation Module
//!
//! Checks that run before any ledger or shift write.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: THIS MODULE (pure)                                           │
//! │  ├── Caller identity present                                           │
//! │  ├── Quantities positive, amounts non-negative                         │
//! │  └── Justification present for adjustments / cancellations             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Guarded SQL updates (gym-db)                                 │
//! │  └── stock + delta >= 0, shift still open                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Schema                                                       │
//! │  ├── CHECK (stock_gym >= 0), CHECK (stock_warehouse >= 0)              │
//! │  └── Partial UNIQUE index: one open shift                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::MAX_MOVEMENT_UNITS;

/// Result type for catalog field validation.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Ledger Validators
// =============================================================================

/// Rejects calls without an authenticated user.
///
/// ```rust
/// use gym_core::validation::validate_user;
/// use gym_core::CoreError;
///
/// assert!(validate_user("cashier-7").is_ok());
/// assert_eq!(validate_user("  "), Err(CoreError::Unauthorized));
/// ```
pub fn validate_user(user_id: &str) -> CoreResult<()> {
    if user_id.trim().is_empty() {
        return Err(CoreError::Unauthorized);
    }
    Ok(())
}

/// Quantity for entries, transfers and sales: strictly positive.
pub fn validate_quantity(quantity: i64) -> CoreResult<()> {
    if quantity <= 0 || quantity > MAX_MOVEMENT_UNITS {
        return Err(CoreError::InvalidQuantity { quantity });
    }
    Ok(())
}

/// Adjustment delta: either sign, never zero, at most
/// [`MAX_MOVEMENT_UNITS`] in magnitude.
pub fn validate_adjustment_delta(delta: i64) -> CoreResult<()> {
    if delta == 0 || delta.unsigned_abs() > MAX_MOVEMENT_UNITS.unsigned_abs() {
        return Err(CoreError::InvalidQuantity { quantity: delta });
    }
    Ok(())
}

/// Returns the trimmed justification, or `MissingJustification` when blank.
pub fn validate_justification(notes: Option<&str>) -> CoreResult<String> {
    match notes.map(str::trim) {
        Some(text) if !text.is_empty() => Ok(text.to_string()),
        _ => Err(CoreError::MissingJustification),
    }
}

/// Monetary inputs that cannot be negative (discounts, counted cash, floats).
pub fn validate_non_negative(field: &str, amount: Money) -> CoreResult<()> {
    if amount.is_negative() {
        return Err(CoreError::invalid_amount(field, amount.cents()));
    }
    Ok(())
}

/// Normalizes optional free text: blank becomes `None`.
pub fn normalize_optional(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Catalog Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, numbers, hyphens, underscores
///
/// ```rust
/// use gym_core::validation::validate_sku;
///
/// assert!(validate_sku("WHEY-1KG").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1-200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a price in cents. Zero is allowed (courtesy items).
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a minimum-stock threshold.
pub fn validate_min_stock(min_stock: i64) -> ValidationResult<()> {
    if min_stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "min_stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
