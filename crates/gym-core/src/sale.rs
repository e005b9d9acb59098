//! # Sale Pricing
//!
//! Pure pricing of a point-of-sale line and the request types the ledger
//! consumes.
//!
//! ## Line Formula
//! ```text
//! subtotal = unit_price × quantity
//! total    = subtotal − discount + surcharge      (must be ≥ 0)
//! ```
//!
//! Discount and surcharge are absolute amounts for the whole line, not
//! per-unit and not percentages.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Location, PaymentMethod};
use crate::validation::{validate_non_negative, validate_quantity};

// =============================================================================
// Priced Line
// =============================================================================

/// Amounts frozen onto a SALE movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: i64,
    pub subtotal: Money,
    pub discount: Money,
    pub surcharge: Money,
    pub total: Money,
}

/// Prices one sale line.
///
/// ## Errors
/// - `InvalidQuantity` when `quantity <= 0`
/// - `InvalidAmount` when unit price, discount or surcharge is negative
/// - `InvalidTotal` when the discount exceeds subtotal + surcharge
/// - `AmountOverflow` when subtotal or total cannot be represented
///
/// ```rust
/// use gym_core::money::Money;
/// use gym_core::sale::price_line;
/// use gym_core::CoreError;
///
/// let err = price_line(Money::from_major(10), 1, Money::from_major(15), Money::zero());
/// assert_eq!(err, Err(CoreError::InvalidTotal { total_cents: -500 }));
/// ```
pub fn price_line(
    unit_price: Money,
    quantity: i64,
    discount: Money,
    surcharge: Money,
) -> CoreResult<PricedLine> {
    validate_quantity(quantity)?;
    validate_non_negative("unit price", unit_price)?;
    validate_non_negative("discount", discount)?;
    validate_non_negative("surcharge", surcharge)?;

    let subtotal = unit_price
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| CoreError::AmountOverflow {
            field: "subtotal".to_string(),
        })?;
    let total = subtotal
        .checked_sub(discount)
        .and_then(|net| net.checked_add(surcharge))
        .ok_or_else(|| CoreError::AmountOverflow {
            field: "total".to_string(),
        })?;

    if total.is_negative() {
        return Err(CoreError::InvalidTotal {
            total_cents: total.cents(),
        });
    }

    Ok(PricedLine {
        unit_price,
        quantity,
        subtotal,
        discount,
        surcharge,
        total,
    })
}

// =============================================================================
// Requests
// =============================================================================

/// One product line of a checkout.
///
/// `unit_price` comes from the caller (the pricing/membership collaborator),
/// not from the catalog row.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLine {
    pub product_id: String,
    pub location: Location,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount: Money,
    #[serde(default)]
    pub surcharge: Money,
}

impl SaleLine {
    /// A line at list price with no discount or surcharge.
    pub fn new(product_id: impl Into<String>, location: Location, quantity: i64, unit_price: Money) -> Self {
        SaleLine {
            product_id: product_id.into(),
            location,
            quantity,
            unit_price,
            discount: Money::zero(),
            surcharge: Money::zero(),
        }
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount = discount;
        self
    }

    pub fn with_surcharge(mut self, surcharge: Money) -> Self {
        self.surcharge = surcharge;
        self
    }

    pub fn price(&self) -> CoreResult<PricedLine> {
        price_line(self.unit_price, self.quantity, self.discount, self.surcharge)
    }
}

/// A single sale written directly against a known shift.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub line: SaleLine,
    pub payment_method: PaymentMethod,
    pub ticket_id: String,
    pub member_id: Option<String>,
    pub shift_id: String,
}

/// A multi-line checkout. The shift is resolved by the checkout service and
/// a ticket id is generated when absent.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TicketRequest {
    pub ticket_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub member_id: Option<String>,
    pub lines: Vec<SaleLine>,
}

/// Prices every line of a ticket, failing on the first bad line.
pub fn price_lines(lines: &[SaleLine]) -> CoreResult<Vec<PricedLine>> {
    lines.iter().map(SaleLine::price).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_line_formula() {
        let line = price_line(
            Money::from_major(45),
            3,
            Money::from_major(5),
            Money::from_cents(250),
        )
        .unwrap();

        assert_eq!(line.subtotal.cents(), 13_500);
        assert_eq!(line.total.cents(), 13_250);
    }

    #[test]
    fn test_price_line_zero_total_allowed() {
        let line = price_line(Money::from_major(10), 1, Money::from_major(10), Money::zero()).unwrap();
        assert!(line.total.is_zero());
    }

    #[test]
    fn test_price_line_rejects_bad_inputs() {
        assert_eq!(
            price_line(Money::from_major(10), 0, Money::zero(), Money::zero()),
            Err(CoreError::InvalidQuantity { quantity: 0 })
        );
        assert!(matches!(
            price_line(Money::from_major(10), 1, Money::from_cents(-1), Money::zero()),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!(matches!(
            price_line(Money::from_major(10), 1, Money::zero(), Money::from_cents(-1)),
            Err(CoreError::InvalidAmount { .. })
        ));
        assert!(matches!(
            price_line(Money::from_major(10), 2, Money::from_major(21), Money::zero()),
            Err(CoreError::InvalidTotal { total_cents: -100 })
        ));
    }

    #[test]
    fn test_price_line_overflow_is_an_error() {
        // Largest quantity a movement may carry, at an absurd unit price
        let err = price_line(Money::from_cents(i64::MAX / 1_000), 1_000_000, Money::zero(), Money::zero());
        assert_eq!(
            err,
            Err(CoreError::AmountOverflow {
                field: "subtotal".to_string()
            })
        );

        let err = price_line(Money::from_cents(i64::MAX), 1, Money::zero(), Money::from_cents(1));
        assert_eq!(
            err,
            Err(CoreError::AmountOverflow {
                field: "total".to_string()
            })
        );
    }

    #[test]
    fn test_price_line_rejects_quantity_above_movement_limit() {
        assert_eq!(
            price_line(Money::from_major(1000), i64::MAX / 1000, Money::zero(), Money::zero()),
            Err(CoreError::InvalidQuantity { quantity: i64::MAX / 1000 })
        );
    }

    #[test]
    fn test_price_lines_fails_on_first_bad_line() {
        let lines = vec![
            SaleLine::new("a", Location::Gym, 1, Money::from_major(20)),
            SaleLine::new("b", Location::Gym, -1, Money::from_major(20)),
        ];
        assert_eq!(
            price_lines(&lines),
            Err(CoreError::InvalidQuantity { quantity: -1 })
        );
    }

    #[test]
    fn test_sale_line_builder() {
        let line = SaleLine::new("p", Location::Warehouse, 2, Money::from_major(30))
            .with_discount(Money::from_major(5))
            .with_surcharge(Money::from_major(1));
        assert_eq!(line.price().unwrap().total.cents(), 5_600);
    }
}
