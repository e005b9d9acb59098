//! # Shift Reconciliation
//!
//! Turns a shift's sale movements plus what the cashier counted into the
//! closing report ("corte de caja").
//!
//! ## Formulas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ticket_count        = distinct ticket ids among the sales              │
//! │  total_sales         = Σ total                                          │
//! │  expected[method]    = Σ total where payment_method = method            │
//! │                                                                         │
//! │  cash_in_drawer      = counted.cash + counted.debit + counted.credit    │
//! │                        − withdrawals                                    │
//! │  expected_in_drawer  = opening_cash + total_sales − withdrawals         │
//! │                                                                         │
//! │  difference          = cash_in_drawer − expected_in_drawer              │
//! │                        > 0 surplus, < 0 shortage                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The result is informational. A shift with any variance still closes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{CountedCash, Movement, PaymentMethod, ProductCategory};
use crate::SIGNIFICANT_DIFFERENCE_CENTS;

// =============================================================================
// Input / Output
// =============================================================================

/// Everything the calculator needs. `sales` is the shift's non-cancelled
/// SALE rows; [`reconcile`] skips any other row it is handed.
#[derive(Debug, Clone, Copy)]
pub struct ReconciliationInput<'a> {
    pub opening_cash: Money,
    pub sales: &'a [Movement],
    pub counted: CountedCash,
    pub total_withdrawals: Money,
}

/// Direction of the variance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Variance {
    Balanced,
    Surplus,
    Shortage,
}

/// Expected vs counted for one payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MethodTotal {
    pub method: PaymentMethod,
    pub expected: Money,
    pub counted: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryTotal {
    pub category: ProductCategory,
    pub total: Money,
}

/// The closing report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Reconciliation {
    pub ticket_count: i64,
    pub total_sales: Money,
    /// Always three entries, one per payment method.
    pub by_method: Vec<MethodTotal>,
    /// Only categories with at least one sale.
    pub by_category: Vec<CategoryTotal>,
    pub membership_sales: Money,
    pub product_sales: Money,
    pub opening_cash: Money,
    pub total_withdrawals: Money,
    pub total_cash_in_drawer: Money,
    pub expected_cash_in_drawer: Money,
    pub difference: Money,
    pub has_significant_difference: bool,
}

impl Reconciliation {
    pub fn variance(&self) -> Variance {
        if self.difference.is_zero() {
            Variance::Balanced
        } else if self.difference.is_positive() {
            Variance::Surplus
        } else {
            Variance::Shortage
        }
    }

    pub fn expected_for(&self, method: PaymentMethod) -> Money {
        self.by_method
            .iter()
            .find(|m| m.method == method)
            .map(|m| m.expected)
            .unwrap_or_default()
    }

    pub fn total_for(&self, category: ProductCategory) -> Money {
        self.by_category
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.total)
            .unwrap_or_default()
    }
}

// =============================================================================
// Calculator
// =============================================================================

/// Computes the shift closing report.
///
/// ## Example
/// ```rust
/// use gym_core::money::Money;
/// use gym_core::reconciliation::{reconcile, ReconciliationInput};
/// use gym_core::CountedCash;
///
/// let report = reconcile(ReconciliationInput {
///     opening_cash: Money::from_major(500),
///     sales: &[],
///     counted: CountedCash::cash_only(Money::from_major(480)),
///     total_withdrawals: Money::zero(),
/// });
/// assert_eq!(report.difference, Money::from_major(-20));
/// ```
pub fn reconcile(input: ReconciliationInput<'_>) -> Reconciliation {
    let sales: Vec<&Movement> = input
        .sales
        .iter()
        .filter(|m| m.is_sale() && !m.is_cancelled)
        .collect();

    // A line without a ticket id is its own ticket
    let tickets: HashSet<&str> = sales
        .iter()
        .map(|m| m.ticket_id.as_deref().unwrap_or(m.id.as_str()))
        .collect();

    let total_sales: Money = sales.iter().map(|m| m.total()).sum();

    let by_method = PaymentMethod::ALL
        .iter()
        .map(|&method| MethodTotal {
            method,
            expected: sales
                .iter()
                .filter(|m| m.payment_method == Some(method))
                .map(|m| m.total())
                .sum(),
            counted: input.counted.get(method),
        })
        .collect();

    let mut categories: BTreeMap<ProductCategory, Money> = BTreeMap::new();
    for sale in &sales {
        *categories.entry(sale.category).or_default() += sale.total();
    }
    let membership_sales: Money = categories
        .iter()
        .filter(|(category, _)| category.is_membership())
        .map(|(_, total)| *total)
        .sum();
    let by_category = categories
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect();

    let total_cash_in_drawer = input.counted.total() - input.total_withdrawals;
    let expected_cash_in_drawer = input.opening_cash + total_sales - input.total_withdrawals;
    let difference = total_cash_in_drawer - expected_cash_in_drawer;

    Reconciliation {
        ticket_count: tickets.len() as i64,
        total_sales,
        by_method,
        by_category,
        membership_sales,
        product_sales: total_sales - membership_sales,
        opening_cash: input.opening_cash,
        total_withdrawals: input.total_withdrawals,
        total_cash_in_drawer,
        expected_cash_in_drawer,
        difference,
        has_significant_difference: is_significant(difference),
    }
}

/// `|difference| > 0.01`.
#[inline]
pub fn is_significant(difference: Money) -> bool {
    difference.abs().cents() > SIGNIFICANT_DIFFERENCE_CENTS
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Location, MovementType};
    use chrono::Utc;

    fn sale(id: &str, ticket: Option<&str>, total: Money, method: PaymentMethod, category: ProductCategory) -> Movement {
        Movement {
            id: id.to_string(),
            product_id: "p".to_string(),
            movement_type: MovementType::Sale,
            location: Location::Gym,
            quantity: -1,
            category,
            ticket_id: ticket.map(str::to_string),
            member_id: None,
            user_id: "u".to_string(),
            unit_price_cents: Some(total.cents()),
            subtotal_cents: Some(total.cents()),
            discount_cents: Some(0),
            surcharge_cents: Some(0),
            total_cents: Some(total.cents()),
            payment_method: Some(method),
            shift_id: Some("s".to_string()),
            transfer_id: None,
            reverses_movement_id: None,
            notes: None,
            is_cancelled: false,
            cancellation_reason: None,
            cancelled_at: None,
            cancelled_by: None,
            occurred_at: Utc::now(),
        }
    }

    fn cash_sales_totaling_1940() -> Vec<Movement> {
        vec![
            sale("m1", Some("t1"), Money::from_major(1200), PaymentMethod::Cash, ProductCategory::Membership),
            sale("m2", Some("t2"), Money::from_major(650), PaymentMethod::Cash, ProductCategory::Supplement),
            sale("m3", Some("t2"), Money::from_major(90), PaymentMethod::Cash, ProductCategory::Beverage),
        ]
    }

    #[test]
    fn test_balanced_drawer() {
        let sales = cash_sales_totaling_1940();
        let report = reconcile(ReconciliationInput {
            opening_cash: Money::from_major(500),
            sales: &sales,
            counted: CountedCash::cash_only(Money::from_major(2440)),
            total_withdrawals: Money::zero(),
        });

        assert_eq!(report.total_sales, Money::from_major(1940));
        assert_eq!(report.ticket_count, 2);
        assert_eq!(report.difference, Money::zero());
        assert!(!report.has_significant_difference);
        assert_eq!(report.variance(), Variance::Balanced);
    }

    #[test]
    fn test_shortage_of_forty() {
        let sales = cash_sales_totaling_1940();
        let report = reconcile(ReconciliationInput {
            opening_cash: Money::from_major(500),
            sales: &sales,
            counted: CountedCash::cash_only(Money::from_major(2400)),
            total_withdrawals: Money::zero(),
        });

        assert_eq!(report.difference, Money::from_major(-40));
        assert!(report.has_significant_difference);
        assert_eq!(report.variance(), Variance::Shortage);
    }

    #[test]
    fn test_withdrawals_cancel_out_of_difference() {
        let sales = cash_sales_totaling_1940();
        let report = reconcile(ReconciliationInput {
            opening_cash: Money::from_major(500),
            sales: &sales,
            counted: CountedCash::cash_only(Money::from_major(2440)),
            total_withdrawals: Money::from_major(300),
        });

        assert_eq!(report.total_cash_in_drawer, Money::from_major(2140));
        assert_eq!(report.expected_cash_in_drawer, Money::from_major(2140));
        assert!(report.difference.is_zero());
    }

    #[test]
    fn test_breakdowns() {
        let sales = vec![
            sale("m1", Some("t1"), Money::from_major(100), PaymentMethod::Cash, ProductCategory::Supplement),
            sale("m2", Some("t2"), Money::from_major(40), PaymentMethod::Debit, ProductCategory::Beverage),
            sale("m3", None, Money::from_major(700), PaymentMethod::Credit, ProductCategory::Membership),
            sale("m4", None, Money::from_major(700), PaymentMethod::Credit, ProductCategory::Membership),
        ];
        let report = reconcile(ReconciliationInput {
            opening_cash: Money::zero(),
            sales: &sales,
            counted: CountedCash::new(Money::from_major(100), Money::from_major(40), Money::from_major(1400)),
            total_withdrawals: Money::zero(),
        });

        // Two ticketless lines count as two tickets
        assert_eq!(report.ticket_count, 4);
        assert_eq!(report.expected_for(PaymentMethod::Cash), Money::from_major(100));
        assert_eq!(report.expected_for(PaymentMethod::Debit), Money::from_major(40));
        assert_eq!(report.expected_for(PaymentMethod::Credit), Money::from_major(1400));
        assert_eq!(report.membership_sales, Money::from_major(1400));
        assert_eq!(report.product_sales, Money::from_major(140));
        assert_eq!(report.total_for(ProductCategory::Beverage), Money::from_major(40));
        assert_eq!(report.total_for(ProductCategory::Apparel), Money::zero());
        assert_eq!(report.by_method.len(), 3);
        assert!(report.difference.is_zero());
    }

    #[test]
    fn test_cancelled_and_non_sale_rows_are_ignored() {
        let mut cancelled = sale("m1", Some("t1"), Money::from_major(100), PaymentMethod::Cash, ProductCategory::Snack);
        cancelled.is_cancelled = true;
        let mut entry = sale("m2", None, Money::from_major(100), PaymentMethod::Cash, ProductCategory::Snack);
        entry.movement_type = MovementType::Entry;

        let sales = [cancelled, entry];
        let report = reconcile(ReconciliationInput {
            opening_cash: Money::from_major(50),
            sales: &sales,
            counted: CountedCash::cash_only(Money::from_major(50)),
            total_withdrawals: Money::zero(),
        });

        assert_eq!(report.ticket_count, 0);
        assert!(report.total_sales.is_zero());
        assert!(report.by_category.is_empty());
    }

    #[test]
    fn test_significance_threshold() {
        assert!(!is_significant(Money::zero()));
        assert!(!is_significant(Money::from_cents(1)));
        assert!(!is_significant(Money::from_cents(-1)));
        assert!(is_significant(Money::from_cents(2)));
        assert!(is_significant(Money::from_cents(-2)));
    }

    #[test]
    fn test_surplus() {
        let report = reconcile(ReconciliationInput {
            opening_cash: Money::from_major(500),
            sales: &[],
            counted: CountedCash::cash_only(Money::from_major(520)),
            total_withdrawals: Money::zero(),
        });
        assert_eq!(report.variance(), Variance::Surplus);
        assert_eq!(report.difference, Money::from_major(20));
    }
}
