//! # Shift Manager
//!
//! Cash-register shifts ("cortes"): open, scope sales, reconcile and close.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   NONE_OPEN ──open_shift──► OPEN ──close_shift──► CLOSED (terminal)     │
//! │       ▲                      │                                          │
//! │       │                      │ record_sale / record_ticket              │
//! │       │                      │ cancel_sale                              │
//! │       └──────────────────────┘ (only while OPEN)                        │
//! │                                                                         │
//! │  At most one shift in the whole system is OPEN. The partial unique     │
//! │  index on `closed_at IS NULL` makes a second concurrent open fail at   │
//! │  insert time, whatever the check before it saw.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Closing gathers the shift's live SALE rows, runs
//! [`gym_core::reconciliation::reconcile`] and persists the result in one
//! transaction. A large variance is logged, never blocking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gym_core::reconciliation::{reconcile, Reconciliation, ReconciliationInput};
use gym_core::validation::{normalize_optional, validate_non_negative, validate_user};
use gym_core::{CoreError, CountedCash, Money, PaymentMethod, Shift, ShiftCategoryTotal, ShiftClose};

use crate::error::{is_unique_violation, DbError, DbResult};
use crate::pool::begin_write;
use crate::repository::ledger::live_sales_for_shift;

// =============================================================================
// Results
// =============================================================================

/// A shift as it was persisted at close, with the full calculator output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedShift {
    pub shift: Shift,
    pub reconciliation: Reconciliation,
}

/// A stored shift plus its per-category sales (empty while open).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftReport {
    pub shift: Shift,
    pub category_totals: Vec<ShiftCategoryTotal>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for shift operations.
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
    folio_prefix: String,
}

impl ShiftRepository {
    pub fn new(pool: SqlitePool, folio_prefix: impl Into<String>) -> Self {
        ShiftRepository {
            pool,
            folio_prefix: folio_prefix.into(),
        }
    }

    /// Opens a shift with the given float.
    ///
    /// ## Errors
    /// - `Unauthorized` for a blank cashier
    /// - `InvalidAmount` for a negative opening cash
    /// - `ShiftAlreadyOpen` when any shift is open
    pub async fn open_shift(&self, cashier_id: &str, opening_cash: Money) -> DbResult<Shift> {
        validate_user(cashier_id)?;
        validate_non_negative("opening cash", opening_cash)?;

        let mut tx = begin_write(&self.pool).await?;

        if let Some(open) = find_open(&mut tx).await? {
            return Err(CoreError::ShiftAlreadyOpen { folio: open.folio }.into());
        }

        let now = Utc::now();
        let folio = next_folio(&mut tx, &self.folio_prefix, now).await?;
        let shift = new_shift(folio, cashier_id.trim(), opening_cash, now);

        let inserted = sqlx::query(
            r#"
            INSERT INTO shifts (id, folio, cashier_id, opened_at, opening_cash_cents)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.folio)
        .bind(&shift.cashier_id)
        .bind(shift.opened_at)
        .bind(shift.opening_cash_cents)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            if !is_unique_violation(&err) {
                return Err(err.into());
            }
            // Lost a race: either another register opened first or took the folio
            return Err(match find_open(&mut tx).await? {
                Some(open) => DbError::from(CoreError::ShiftAlreadyOpen { folio: open.folio }),
                None => DbError::duplicate("folio", shift.folio),
            });
        }

        tx.commit().await?;

        info!(
            shift_id = %shift.id,
            folio = %shift.folio,
            cashier_id = %shift.cashier_id,
            opening_cash = %opening_cash,
            "Shift opened"
        );
        Ok(shift)
    }

    /// The open shift, if any.
    pub async fn get_active_shift(&self) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        find_open(&mut conn).await
    }

    pub async fn get_shift(&self, shift_id: &str) -> DbResult<Option<Shift>> {
        let mut conn = self.pool.acquire().await?;
        fetch_shift(&mut conn, shift_id).await
    }

    /// Most recent shifts first.
    pub async fn list_shifts(&self, limit: u32) -> DbResult<Vec<Shift>> {
        let shifts = sqlx::query_as::<_, Shift>(
            "SELECT * FROM shifts ORDER BY opened_at DESC, rowid DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(shifts)
    }

    /// Reconciles and closes a shift.
    ///
    /// ## Errors
    /// - `Unauthorized`
    /// - `InvalidAmount` for negative counted amounts or withdrawals
    /// - `NotFound`, `AlreadyClosed`
    pub async fn close_shift(&self, shift_id: &str, close: &ShiftClose, user_id: &str) -> DbResult<ClosedShift> {
        validate_user(user_id)?;
        validate_counted(&close.counted, close.total_withdrawals)?;

        let mut tx = begin_write(&self.pool).await?;

        let shift = ensure_open(&mut tx, shift_id).await?;
        let sales = live_sales_for_shift(&mut tx, shift_id).await?;

        let report = reconcile(ReconciliationInput {
            opening_cash: shift.opening_cash(),
            sales: &sales,
            counted: close.counted,
            total_withdrawals: close.total_withdrawals,
        });

        debug!(
            shift_id = %shift_id,
            sales = sales.len(),
            total_sales = %report.total_sales,
            "Closing shift"
        );

        let closed = sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts SET
                closed_at = ?2,
                ticket_count = ?3,
                total_sales_cents = ?4,
                sales_cash_cents = ?5,
                sales_debit_cents = ?6,
                sales_credit_cents = ?7,
                sales_memberships_cents = ?8,
                sales_products_cents = ?9,
                counted_cash_cents = ?10,
                counted_debit_cents = ?11,
                counted_credit_cents = ?12,
                total_withdrawals_cents = ?13,
                withdrawals_concept = ?14,
                total_cash_in_drawer_cents = ?15,
                expected_cash_in_drawer_cents = ?16,
                difference_cents = ?17,
                notes = ?18,
                closed_by = ?19
            WHERE id = ?1 AND closed_at IS NULL
            RETURNING *
            "#,
        )
        .bind(shift_id)
        .bind(Utc::now())
        .bind(report.ticket_count)
        .bind(report.total_sales.cents())
        .bind(report.expected_for(PaymentMethod::Cash).cents())
        .bind(report.expected_for(PaymentMethod::Debit).cents())
        .bind(report.expected_for(PaymentMethod::Credit).cents())
        .bind(report.membership_sales.cents())
        .bind(report.product_sales.cents())
        .bind(close.counted.cash.cents())
        .bind(close.counted.debit.cents())
        .bind(close.counted.credit.cents())
        .bind(close.total_withdrawals.cents())
        .bind(normalize_optional(close.withdrawals_concept.as_deref()))
        .bind(report.total_cash_in_drawer.cents())
        .bind(report.expected_cash_in_drawer.cents())
        .bind(report.difference.cents())
        .bind(normalize_optional(close.notes.as_deref()))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| CoreError::AlreadyClosed {
            shift_id: shift_id.to_string(),
        })?;

        for category in &report.by_category {
            sqlx::query(
                "INSERT INTO shift_category_totals (shift_id, category, total_cents) VALUES (?1, ?2, ?3)",
            )
            .bind(shift_id)
            .bind(category.category)
            .bind(category.total.cents())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        if report.has_significant_difference {
            warn!(
                folio = %closed.folio,
                difference = %report.difference,
                variance = ?report.variance(),
                "Shift closed with cash variance"
            );
        }
        info!(
            shift_id = %closed.id,
            folio = %closed.folio,
            tickets = report.ticket_count,
            total_sales = %report.total_sales,
            difference = %report.difference,
            "Shift closed"
        );

        Ok(ClosedShift {
            shift: closed,
            reconciliation: report,
        })
    }

    /// Runs the closing calculator on an open shift without persisting.
    pub async fn preview_close(
        &self,
        shift_id: &str,
        counted: CountedCash,
        total_withdrawals: Money,
    ) -> DbResult<Reconciliation> {
        validate_counted(&counted, total_withdrawals)?;

        let mut tx = self.pool.begin().await?;
        let shift = ensure_open(&mut tx, shift_id).await?;
        let sales = live_sales_for_shift(&mut tx, shift_id).await?;
        tx.commit().await?;

        Ok(reconcile(ReconciliationInput {
            opening_cash: shift.opening_cash(),
            sales: &sales,
            counted,
            total_withdrawals,
        }))
    }

    /// A shift and its persisted category totals.
    pub async fn shift_report(&self, shift_id: &str) -> DbResult<ShiftReport> {
        let mut tx = self.pool.begin().await?;

        let shift = fetch_shift(&mut tx, shift_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Shift", shift_id))?;

        let category_totals = sqlx::query_as::<_, ShiftCategoryTotal>(
            "SELECT * FROM shift_category_totals WHERE shift_id = ?1 ORDER BY category",
        )
        .bind(shift_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(ShiftReport { shift, category_totals })
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Loads a shift that must exist and be open.
///
/// ## Errors
/// - `NotFound` when the shift does not exist
/// - `AlreadyClosed` when it has a closing timestamp
pub(crate) async fn ensure_open(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<Shift> {
    let shift = fetch_shift(conn, shift_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Shift", shift_id))?;

    if !shift.is_open() {
        return Err(CoreError::AlreadyClosed { shift_id: shift.id }.into());
    }
    Ok(shift)
}

async fn fetch_shift(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>("SELECT * FROM shifts WHERE id = ?1")
        .bind(shift_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(shift)
}

async fn find_open(conn: &mut SqliteConnection) -> DbResult<Option<Shift>> {
    let shift = sqlx::query_as::<_, Shift>("SELECT * FROM shifts WHERE closed_at IS NULL LIMIT 1")
        .fetch_optional(&mut *conn)
        .await?;

    Ok(shift)
}

/// `<PREFIX>-YYYYMMDD-NNN`, numbered per UTC day.
async fn next_folio(conn: &mut SqliteConnection, prefix: &str, now: DateTime<Utc>) -> DbResult<String> {
    let day_prefix = format!("{}-{}-", prefix, now.format("%Y%m%d"));

    let opened_today: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM shifts WHERE substr(folio, 1, length(?1)) = ?1")
        .bind(&day_prefix)
        .fetch_one(&mut *conn)
        .await?;

    Ok(format!("{}{:03}", day_prefix, opened_today + 1))
}

fn validate_counted(counted: &CountedCash, total_withdrawals: Money) -> DbResult<()> {
    validate_non_negative("counted cash", counted.cash)?;
    validate_non_negative("counted debit", counted.debit)?;
    validate_non_negative("counted credit", counted.credit)?;
    validate_non_negative("withdrawals", total_withdrawals)?;
    Ok(())
}

fn new_shift(folio: String, cashier_id: &str, opening_cash: Money, opened_at: DateTime<Utc>) -> Shift {
    Shift {
        id: Uuid::new_v4().to_string(),
        folio,
        cashier_id: cashier_id.to_string(),
        opened_at,
        closed_at: None,
        opening_cash_cents: opening_cash.cents(),
        ticket_count: None,
        total_sales_cents: None,
        sales_cash_cents: None,
        sales_debit_cents: None,
        sales_credit_cents: None,
        sales_memberships_cents: None,
        sales_products_cents: None,
        counted_cash_cents: None,
        counted_debit_cents: None,
        counted_credit_cents: None,
        total_withdrawals_cents: None,
        withdrawals_concept: None,
        total_cash_in_drawer_cents: None,
        expected_cash_in_drawer_cents: None,
        difference_cents: None,
        notes: None,
        closed_by: None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
