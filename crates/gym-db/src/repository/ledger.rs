//! # Movement Ledger
//!
//! Append-only log of typed, signed stock events. Every write here changes
//! stock through [`super::stock`] and appends its ledger row(s) in the same
//! transaction.
//!
//! ## Operations → Rows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Operation          Rows appended                    Stock              │
//! │  ─────────────      ──────────────────────────────   ────────────────   │
//! │  record_entry       ENTRY        +q @ loc            loc += q           │
//! │  record_transfer    TRANSFER_OUT −q @ from  ┐ same   from −= q          │
//! │                     TRANSFER_IN  +q @ to    ┘ id     to   += q          │
//! │  record_adjustment  ADJUSTMENT   ±d @ loc            loc += d           │
//! │  record_sale        SALE         −q @ loc (shift)    loc −= q           │
//! │  record_ticket      SALE × lines, one ticket id      per line           │
//! │  cancel_sale        (flag original)                                     │
//! │                     ENTRY        +q @ loc (reverses) loc += q           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows are never updated except for the cancellation overlay, and never
//! deleted. The schema enforces both with triggers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use gym_core::sale::{price_lines, PricedLine, SaleLine, SaleRequest};
use gym_core::validation::{
    normalize_optional, validate_adjustment_delta, validate_justification, validate_quantity,
    validate_user,
};
use gym_core::{CoreError, Location, Movement, MovementType, PaymentMethod, ProductCategory, ValidationError};

use crate::error::DbResult;
use crate::pool::begin_write;
use crate::repository::shift::ensure_open;
use crate::repository::stock::{apply_delta, load_product};

// =============================================================================
// Results
// =============================================================================

/// Both rows of one transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub transfer_id: String,
    pub outbound: Movement,
    pub inbound: Movement,
}

/// A cancelled sale and the entry that put its units back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    /// The original SALE row, with the cancellation overlay set.
    pub sale: Movement,
    pub compensation: Movement,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for ledger writes and queries.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Goods received at `location`.
    ///
    /// ## Errors
    /// - `Unauthorized`, `InvalidQuantity`
    /// - `NotFound` for an unknown product
    pub async fn record_entry(
        &self,
        product_id: &str,
        location: Location,
        quantity: i64,
        user_id: &str,
        notes: Option<&str>,
    ) -> DbResult<Movement> {
        validate_user(user_id)?;
        validate_quantity(quantity)?;

        debug!(product_id = %product_id, %location, quantity, "Recording entry");

        let mut tx = begin_write(&self.pool).await?;

        let change = apply_delta(&mut tx, product_id, location, quantity).await?;
        let movement = Movement {
            notes: normalize_optional(notes),
            ..new_movement(product_id, MovementType::Entry, location, quantity, change.category, user_id, Utc::now())
        };
        insert_movement(&mut tx, &movement).await?;

        tx.commit().await?;

        Ok(movement)
    }

    /// Moves units between the two locations. The product total is unchanged.
    ///
    /// ## Errors
    /// - `Unauthorized`, `InvalidQuantity`
    /// - `InvalidTransfer` when `from == to`
    /// - `InsufficientStock` when `from` holds fewer than `quantity`
    /// - `NotFound` for an unknown product
    pub async fn record_transfer(
        &self,
        product_id: &str,
        from: Location,
        to: Location,
        quantity: i64,
        user_id: &str,
        notes: Option<&str>,
    ) -> DbResult<TransferRecord> {
        validate_user(user_id)?;
        validate_quantity(quantity)?;
        if from == to {
            return Err(CoreError::InvalidTransfer { location: from }.into());
        }

        debug!(product_id = %product_id, %from, %to, quantity, "Recording transfer");

        let transfer_id = Uuid::new_v4().to_string();
        let notes = normalize_optional(notes);
        let now = Utc::now();

        let mut tx = begin_write(&self.pool).await?;

        let change = apply_delta(&mut tx, product_id, from, -quantity).await?;
        apply_delta(&mut tx, product_id, to, quantity).await?;

        let outbound = Movement {
            transfer_id: Some(transfer_id.clone()),
            notes: notes.clone(),
            ..new_movement(product_id, MovementType::TransferOut, from, -quantity, change.category, user_id, now)
        };
        let inbound = Movement {
            transfer_id: Some(transfer_id.clone()),
            notes,
            ..new_movement(product_id, MovementType::TransferIn, to, quantity, change.category, user_id, now)
        };
        insert_movement(&mut tx, &outbound).await?;
        insert_movement(&mut tx, &inbound).await?;

        tx.commit().await?;

        Ok(TransferRecord {
            transfer_id,
            outbound,
            inbound,
        })
    }

    /// Manual correction at one location; `notes` is the mandatory reason.
    ///
    /// ## Errors
    /// - `Unauthorized`
    /// - `MissingJustification` when `notes` is blank
    /// - `InvalidQuantity` when `delta == 0`
    /// - `InsufficientStock` when the result would be negative
    pub async fn record_adjustment(
        &self,
        product_id: &str,
        location: Location,
        delta: i64,
        user_id: &str,
        notes: Option<&str>,
    ) -> DbResult<Movement> {
        validate_user(user_id)?;
        let reason = validate_justification(notes)?;
        validate_adjustment_delta(delta)?;

        debug!(product_id = %product_id, %location, delta, "Recording adjustment");

        let mut tx = begin_write(&self.pool).await?;

        let change = apply_delta(&mut tx, product_id, location, delta).await?;
        let movement = Movement {
            notes: Some(reason),
            ..new_movement(product_id, MovementType::Adjustment, location, delta, change.category, user_id, Utc::now())
        };
        insert_movement(&mut tx, &movement).await?;

        tx.commit().await?;

        Ok(movement)
    }

    /// One point-of-sale line against a known shift.
    ///
    /// ## Errors
    /// - `Unauthorized`, `InvalidQuantity`, `InvalidAmount`, `InvalidTotal`
    /// - `NotFound` (shift or product), `AlreadyClosed` (shift)
    /// - `ProductInactive`, `InsufficientStock`
    pub async fn record_sale(&self, request: &SaleRequest, user_id: &str) -> DbResult<Movement> {
        validate_user(user_id)?;
        let priced = request.line.price()?;
        let ticket_id = require_ticket(&request.ticket_id)?;
        let member_id = normalize_optional(request.member_id.as_deref());

        debug!(
            shift_id = %request.shift_id,
            ticket_id = %ticket_id,
            product_id = %request.line.product_id,
            quantity = request.line.quantity,
            "Recording sale"
        );

        let mut tx = begin_write(&self.pool).await?;

        ensure_open(&mut tx, &request.shift_id).await?;
        let sale = SaleContext {
            shift_id: &request.shift_id,
            ticket_id,
            payment_method: request.payment_method,
            member_id: member_id.as_deref(),
            user_id,
            occurred_at: Utc::now(),
        };
        let movement = write_sale_line(&mut tx, &sale, &request.line, &priced).await?;

        tx.commit().await?;

        Ok(movement)
    }

    /// All lines of one checkout under one ticket id, all or nothing.
    ///
    /// Any failing line aborts the whole ticket; nothing is written.
    pub async fn record_ticket(
        &self,
        shift_id: &str,
        ticket_id: &str,
        payment_method: PaymentMethod,
        member_id: Option<&str>,
        lines: &[SaleLine],
        user_id: &str,
    ) -> DbResult<Vec<Movement>> {
        validate_user(user_id)?;
        if lines.is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "lines".to_string(),
            })
            .into());
        }
        let priced = price_lines(lines)?;
        let ticket_id = require_ticket(ticket_id)?;
        let member_id = normalize_optional(member_id);

        debug!(shift_id = %shift_id, ticket_id = %ticket_id, lines = lines.len(), "Recording ticket");

        let mut tx = begin_write(&self.pool).await?;

        ensure_open(&mut tx, shift_id).await?;
        let sale = SaleContext {
            shift_id,
            ticket_id,
            payment_method,
            member_id: member_id.as_deref(),
            user_id,
            occurred_at: Utc::now(),
        };

        let mut movements = Vec::with_capacity(lines.len());
        for (line, priced) in lines.iter().zip(&priced) {
            movements.push(write_sale_line(&mut tx, &sale, line, priced).await?);
        }

        tx.commit().await?;

        Ok(movements)
    }

    /// Cancels one sale: flags it and appends a compensating entry.
    ///
    /// ## Errors
    /// - `Unauthorized`
    /// - `NotFound`, `AlreadyCancelled`, `NotASale`
    /// - `MissingJustification` when `reason` is blank
    /// - `AlreadyClosed` when the sale's shift has been closed
    pub async fn cancel_sale(&self, movement_id: &str, reason: &str, user_id: &str) -> DbResult<Cancellation> {
        validate_user(user_id)?;

        let mut tx = begin_write(&self.pool).await?;

        let original = fetch_movement(&mut tx, movement_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Movement", movement_id))?;
        if original.is_cancelled {
            return Err(CoreError::AlreadyCancelled {
                movement_id: original.id,
            }
            .into());
        }
        if !original.is_sale() {
            return Err(CoreError::NotASale {
                movement_id: original.id,
                movement_type: original.movement_type,
            }
            .into());
        }
        let reason = validate_justification(Some(reason))?;

        let cancellation = cancel_in_tx(&mut tx, original, &reason, user_id, Utc::now()).await?;

        tx.commit().await?;

        info!(
            movement_id = %cancellation.sale.id,
            compensation_id = %cancellation.compensation.id,
            "Sale cancelled"
        );
        Ok(cancellation)
    }

    /// Cancels every live SALE line of a ticket in one transaction.
    ///
    /// ## Errors
    /// - `NotFound` when the ticket has no sale rows
    /// - `AlreadyCancelled` when every line is already cancelled
    /// - otherwise as [`Self::cancel_sale`]
    pub async fn cancel_ticket(&self, ticket_id: &str, reason: &str, user_id: &str) -> DbResult<Vec<Cancellation>> {
        validate_user(user_id)?;
        let reason = validate_justification(Some(reason))?;

        let mut tx = begin_write(&self.pool).await?;

        let lines = sqlx::query_as::<_, Movement>(
            r#"
            SELECT * FROM movements
            WHERE ticket_id = ?1 AND movement_type = 'sale'
            ORDER BY occurred_at, rowid
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&mut *tx)
        .await?;

        let first_id = match lines.first() {
            Some(line) => line.id.clone(),
            None => return Err(CoreError::not_found("Ticket", ticket_id).into()),
        };
        let pending: Vec<Movement> = lines.into_iter().filter(|m| !m.is_cancelled).collect();
        if pending.is_empty() {
            return Err(CoreError::AlreadyCancelled { movement_id: first_id }.into());
        }

        let now = Utc::now();
        let mut cancellations = Vec::with_capacity(pending.len());
        for line in pending {
            cancellations.push(cancel_in_tx(&mut tx, line, &reason, user_id, now).await?);
        }

        tx.commit().await?;

        info!(ticket_id = %ticket_id, lines = cancellations.len(), "Ticket cancelled");
        Ok(cancellations)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_movement(&self, movement_id: &str) -> DbResult<Option<Movement>> {
        let mut conn = self.pool.acquire().await?;
        fetch_movement(&mut conn, movement_id).await
    }

    /// Latest movements of a product, newest first.
    pub async fn query_by_product(&self, product_id: &str, limit: u32) -> DbResult<Vec<Movement>> {
        debug!(product_id = %product_id, limit, "Querying movements by product");

        let movements = sqlx::query_as::<_, Movement>(
            r#"
            SELECT * FROM movements
            WHERE product_id = ?1
            ORDER BY occurred_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// SALE rows of one ticket, oldest first.
    pub async fn query_by_ticket(&self, ticket_id: &str) -> DbResult<Vec<Movement>> {
        let movements = sqlx::query_as::<_, Movement>(
            r#"
            SELECT * FROM movements
            WHERE ticket_id = ?1 AND movement_type = 'sale'
            ORDER BY occurred_at, rowid
            "#,
        )
        .bind(ticket_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Movements with `start <= occurred_at <= end`, oldest first.
    pub async fn query_by_date_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DbResult<Vec<Movement>> {
        debug!(%start, %end, "Querying movements by date range");

        let movements = sqlx::query_as::<_, Movement>(
            r#"
            SELECT * FROM movements
            WHERE occurred_at >= ?1 AND occurred_at <= ?2
            ORDER BY occurred_at, rowid
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Non-cancelled SALE rows of a shift, oldest first.
    pub async fn sales_for_shift(&self, shift_id: &str) -> DbResult<Vec<Movement>> {
        let mut conn = self.pool.acquire().await?;
        live_sales_for_shift(&mut conn, shift_id).await
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Fields shared by every line of one checkout.
struct SaleContext<'a> {
    shift_id: &'a str,
    ticket_id: &'a str,
    payment_method: PaymentMethod,
    member_id: Option<&'a str>,
    user_id: &'a str,
    occurred_at: DateTime<Utc>,
}

fn require_ticket(ticket_id: &str) -> DbResult<&str> {
    let ticket_id = ticket_id.trim();
    if ticket_id.is_empty() {
        return Err(CoreError::from(ValidationError::Required {
            field: "ticket_id".to_string(),
        })
        .into());
    }
    Ok(ticket_id)
}

fn new_movement(
    product_id: &str,
    movement_type: MovementType,
    location: Location,
    quantity: i64,
    category: ProductCategory,
    user_id: &str,
    occurred_at: DateTime<Utc>,
) -> Movement {
    Movement {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        movement_type,
        location,
        quantity,
        category,
        ticket_id: None,
        member_id: None,
        user_id: user_id.to_string(),
        unit_price_cents: None,
        subtotal_cents: None,
        discount_cents: None,
        surcharge_cents: None,
        total_cents: None,
        payment_method: None,
        shift_id: None,
        transfer_id: None,
        reverses_movement_id: None,
        notes: None,
        is_cancelled: false,
        cancellation_reason: None,
        cancelled_at: None,
        cancelled_by: None,
        occurred_at,
    }
}

async fn write_sale_line(
    conn: &mut SqliteConnection,
    sale: &SaleContext<'_>,
    line: &SaleLine,
    priced: &PricedLine,
) -> DbResult<Movement> {
    let product = load_product(conn, &line.product_id).await?;
    if !product.is_active {
        return Err(CoreError::ProductInactive {
            product_id: product.id,
        }
        .into());
    }

    let change = apply_delta(conn, &line.product_id, line.location, -line.quantity).await?;

    let movement = Movement {
        ticket_id: Some(sale.ticket_id.to_string()),
        member_id: sale.member_id.map(str::to_string),
        unit_price_cents: Some(priced.unit_price.cents()),
        subtotal_cents: Some(priced.subtotal.cents()),
        discount_cents: Some(priced.discount.cents()),
        surcharge_cents: Some(priced.surcharge.cents()),
        total_cents: Some(priced.total.cents()),
        payment_method: Some(sale.payment_method),
        shift_id: Some(sale.shift_id.to_string()),
        ..new_movement(
            &line.product_id,
            MovementType::Sale,
            line.location,
            -line.quantity,
            change.category,
            sale.user_id,
            sale.occurred_at,
        )
    };
    insert_movement(conn, &movement).await?;

    Ok(movement)
}

/// Flags `original` and appends its compensating entry.
///
/// The caller has already checked that `original` is a live SALE row.
async fn cancel_in_tx(
    conn: &mut SqliteConnection,
    mut original: Movement,
    reason: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> DbResult<Cancellation> {
    if let Some(shift_id) = original.shift_id.as_deref() {
        ensure_open(conn, shift_id).await?;
    }

    let flagged = sqlx::query(
        r#"
        UPDATE movements SET
            is_cancelled = 1,
            cancellation_reason = ?2,
            cancelled_at = ?3,
            cancelled_by = ?4
        WHERE id = ?1 AND is_cancelled = 0
        "#,
    )
    .bind(&original.id)
    .bind(reason)
    .bind(now)
    .bind(user_id)
    .execute(&mut *conn)
    .await?;

    if flagged.rows_affected() == 0 {
        return Err(CoreError::AlreadyCancelled {
            movement_id: original.id,
        }
        .into());
    }

    apply_delta(conn, &original.product_id, original.location, original.units()).await?;

    let compensation = Movement {
        ticket_id: original.ticket_id.clone(),
        reverses_movement_id: Some(original.id.clone()),
        notes: Some(reason.to_string()),
        ..new_movement(
            &original.product_id,
            MovementType::Entry,
            original.location,
            original.units(),
            original.category,
            user_id,
            now,
        )
    };
    insert_movement(conn, &compensation).await?;

    original.is_cancelled = true;
    original.cancellation_reason = Some(reason.to_string());
    original.cancelled_at = Some(now);
    original.cancelled_by = Some(user_id.to_string());

    Ok(Cancellation {
        sale: original,
        compensation,
    })
}

async fn insert_movement(conn: &mut SqliteConnection, movement: &Movement) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO movements (
            id, product_id, movement_type, location, quantity, category,
            ticket_id, member_id, user_id,
            unit_price_cents, subtotal_cents, discount_cents, surcharge_cents,
            total_cents, payment_method,
            shift_id, transfer_id, reverses_movement_id, notes,
            is_cancelled, cancellation_reason, cancelled_at, cancelled_by,
            occurred_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9,
            ?10, ?11, ?12, ?13,
            ?14, ?15,
            ?16, ?17, ?18, ?19,
            ?20, ?21, ?22, ?23,
            ?24
        )
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.location)
    .bind(movement.quantity)
    .bind(movement.category)
    .bind(&movement.ticket_id)
    .bind(&movement.member_id)
    .bind(&movement.user_id)
    .bind(movement.unit_price_cents)
    .bind(movement.subtotal_cents)
    .bind(movement.discount_cents)
    .bind(movement.surcharge_cents)
    .bind(movement.total_cents)
    .bind(movement.payment_method)
    .bind(&movement.shift_id)
    .bind(&movement.transfer_id)
    .bind(&movement.reverses_movement_id)
    .bind(&movement.notes)
    .bind(movement.is_cancelled)
    .bind(&movement.cancellation_reason)
    .bind(movement.cancelled_at)
    .bind(&movement.cancelled_by)
    .bind(movement.occurred_at)
    .execute(&mut *conn)
    .await?;

    debug!(
        id = %movement.id,
        movement_type = %movement.movement_type,
        quantity = movement.quantity,
        "Movement appended"
    );
    Ok(())
}

pub(crate) async fn fetch_movement(conn: &mut SqliteConnection, movement_id: &str) -> DbResult<Option<Movement>> {
    let movement = sqlx::query_as::<_, Movement>("SELECT * FROM movements WHERE id = ?1")
        .bind(movement_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(movement)
}

pub(crate) async fn live_sales_for_shift(conn: &mut SqliteConnection, shift_id: &str) -> DbResult<Vec<Movement>> {
    let sales = sqlx::query_as::<_, Movement>(
        r#"
        SELECT * FROM movements
        WHERE shift_id = ?1 AND movement_type = 'sale' AND is_cancelled = 0
        ORDER BY occurred_at, rowid
        "#,
    )
    .bind(shift_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(sales)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use gym_core::{Money, NewProduct, Product, Shift, ShiftClose};

    const ADMIN: &str = "admin-1";
    const CASHIER: &str = "cashier-1";

    async fn setup() -> (Database, Product) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .create(&NewProduct {
                sku: "SHAKE-CHOC".to_string(),
                name: "Protein Shake Chocolate".to_string(),
                category: ProductCategory::Beverage,
                price_cents: 4_500,
                min_stock: 2,
            })
            .await
            .unwrap();
        (db, product)
    }

    async fn stock(db: &Database, product_id: &str) -> (i64, i64) {
        let p = db.products().get_by_id(product_id).await.unwrap().unwrap();
        (p.stock_gym, p.stock_warehouse)
    }

    async fn open_shift(db: &Database) -> Shift {
        db.shifts().open_shift(CASHIER, Money::from_major(500)).await.unwrap()
    }

    fn sale(product_id: &str, shift_id: &str, quantity: i64) -> SaleRequest {
        SaleRequest {
            line: SaleLine::new(product_id, Location::Gym, quantity, Money::from_major(45)),
            payment_method: PaymentMethod::Cash,
            ticket_id: "T-1".to_string(),
            member_id: None,
            shift_id: shift_id.to_string(),
        }
    }

    fn domain(err: DbError) -> CoreError {
        match err {
            DbError::Domain(core) => core,
            other => panic!("expected domain error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_entry_increments_stock() {
        let (db, product) = setup().await;

        let m = db
            .ledger()
            .record_entry(&product.id, Location::Warehouse, 24, ADMIN, Some("  supplier invoice 88 "))
            .await
            .unwrap();

        assert_eq!(m.movement_type, MovementType::Entry);
        assert_eq!(m.quantity, 24);
        assert_eq!(m.category, ProductCategory::Beverage);
        assert_eq!(m.notes.as_deref(), Some("supplier invoice 88"));
        assert_eq!(stock(&db, &product.id).await, (0, 24));
    }

    #[tokio::test]
    async fn test_entry_validation() {
        let (db, product) = setup().await;
        let ledger = db.ledger();

        let err = ledger.record_entry(&product.id, Location::Gym, 0, ADMIN, None).await.unwrap_err();
        assert_eq!(domain(err), CoreError::InvalidQuantity { quantity: 0 });

        let err = ledger.record_entry(&product.id, Location::Gym, 5, " ", None).await.unwrap_err();
        assert_eq!(domain(err), CoreError::Unauthorized);

        let err = ledger.record_entry("missing", Location::Gym, 5, ADMIN, None).await.unwrap_err();
        assert!(matches!(domain(err), CoreError::NotFound { .. }));

        assert!(ledger.query_by_product(&product.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_writes_linked_pair_and_conserves_total() {
        let (db, product) = setup().await;
        let ledger = db.ledger();
        ledger.record_entry(&product.id, Location::Warehouse, 10, ADMIN, None).await.unwrap();

        let transfer = ledger
            .record_transfer(&product.id, Location::Warehouse, Location::Gym, 4, ADMIN, None)
            .await
            .unwrap();

        assert_eq!(transfer.outbound.movement_type, MovementType::TransferOut);
        assert_eq!(transfer.outbound.quantity, -4);
        assert_eq!(transfer.inbound.movement_type, MovementType::TransferIn);
        assert_eq!(transfer.inbound.quantity, 4);
        assert_eq!(transfer.outbound.transfer_id.as_deref(), Some(transfer.transfer_id.as_str()));
        assert_eq!(transfer.inbound.transfer_id, transfer.outbound.transfer_id);

        let (gym, warehouse) = stock(&db, &product.id).await;
        assert_eq!((gym, warehouse), (4, 6));
        assert_eq!(gym + warehouse, 10);
    }

    #[tokio::test]
    async fn test_failed_transfer_changes_nothing() {
        let (db, product) = setup().await;
        let ledger = db.ledger();
        ledger.record_entry(&product.id, Location::Warehouse, 3, ADMIN, None).await.unwrap();

        let err = ledger
            .record_transfer(&product.id, Location::Warehouse, Location::Gym, 5, ADMIN, None)
            .await
            .unwrap_err();
        assert!(matches!(
            domain(err),
            CoreError::InsufficientStock { available: 3, requested: 5, .. }
        ));

        let err = ledger
            .record_transfer(&product.id, Location::Gym, Location::Gym, 1, ADMIN, None)
            .await
            .unwrap_err();
        assert_eq!(domain(err), CoreError::InvalidTransfer { location: Location::Gym });

        assert_eq!(stock(&db, &product.id).await, (0, 3));
        assert_eq!(ledger.query_by_product(&product.id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjustment_rules() {
        let (db, product) = setup().await;
        let ledger = db.ledger();
        ledger.record_entry(&product.id, Location::Gym, 5, ADMIN, None).await.unwrap();

        let err = ledger
            .record_adjustment(&product.id, Location::Gym, -1, ADMIN, Some("   "))
            .await
            .unwrap_err();
        assert_eq!(domain(err), CoreError::MissingJustification);

        let err = ledger
            .record_adjustment(&product.id, Location::Gym, 0, ADMIN, Some("count"))
            .await
            .unwrap_err();
        assert_eq!(domain(err), CoreError::InvalidQuantity { quantity: 0 });

        let err = ledger
            .record_adjustment(&product.id, Location::Gym, i64::MIN, ADMIN, Some("shrink"))
            .await
            .unwrap_err();
        assert_eq!(domain(err), CoreError::InvalidQuantity { quantity: i64::MIN });

        let err = ledger
            .record_adjustment(&product.id, Location::Gym, -6, ADMIN, Some("count"))
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::InsufficientStock { .. }));

        let m = ledger
            .record_adjustment(&product.id, Location::Gym, -2, ADMIN, Some("broken bottles"))
            .await
            .unwrap();
        assert_eq!(m.movement_type, MovementType::Adjustment);
        assert_eq!(m.notes.as_deref(), Some("broken bottles"));
        assert_eq!(stock(&db, &product.id).await, (3, 0));
    }

    #[tokio::test]
    async fn test_sale_records_amounts_and_decrements() {
        let (db, product) = setup().await;
        let shift = open_shift(&db).await;
        db.ledger().record_entry(&product.id, Location::Gym, 5, ADMIN, None).await.unwrap();

        let mut request = sale(&product.id, &shift.id, 2);
        request.line = request.line.with_discount(Money::from_major(10));
        request.member_id = Some("member-42".to_string());

        let m = db.ledger().record_sale(&request, CASHIER).await.unwrap();

        assert_eq!(m.movement_type, MovementType::Sale);
        assert_eq!(m.quantity, -2);
        assert_eq!(m.subtotal_cents, Some(9_000));
        assert_eq!(m.total_cents, Some(8_000));
        assert_eq!(m.shift_id.as_deref(), Some(shift.id.as_str()));
        assert_eq!(m.member_id.as_deref(), Some("member-42"));
        assert_eq!(stock(&db, &product.id).await, (3, 0));
    }

    #[tokio::test]
    async fn test_sale_of_three_with_two_in_stock() {
        let (db, product) = setup().await;
        let shift = open_shift(&db).await;
        db.ledger().record_entry(&product.id, Location::Gym, 2, ADMIN, None).await.unwrap();

        let err = db.ledger().record_sale(&sale(&product.id, &shift.id, 3), CASHIER).await.unwrap_err();

        assert_eq!(
            domain(err),
            CoreError::InsufficientStock {
                product_id: product.id.clone(),
                location: Location::Gym,
                available: 2,
                requested: 3,
            }
        );
        assert_eq!(stock(&db, &product.id).await, (2, 0));
        assert!(db.ledger().query_by_ticket("T-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sale_requires_open_shift_and_active_product() {
        let (db, product) = setup().await;
        db.ledger().record_entry(&product.id, Location::Gym, 5, ADMIN, None).await.unwrap();

        let err = db.ledger().record_sale(&sale(&product.id, "nope", 1), CASHIER).await.unwrap_err();
        assert!(matches!(domain(err), CoreError::NotFound { .. }));

        let shift = open_shift(&db).await;
        db.products().deactivate(&product.id).await.unwrap();
        let err = db.ledger().record_sale(&sale(&product.id, &shift.id, 1), CASHIER).await.unwrap_err();
        assert!(matches!(domain(err), CoreError::ProductInactive { .. }));

        db.products().reactivate(&product.id).await.unwrap();
        db.shifts().close_shift(&shift.id, &ShiftClose::default(), CASHIER).await.unwrap();
        let err = db.ledger().record_sale(&sale(&product.id, &shift.id, 1), CASHIER).await.unwrap_err();
        assert_eq!(domain(err), CoreError::AlreadyClosed { shift_id: shift.id.clone() });

        assert_eq!(stock(&db, &product.id).await, (5, 0));
    }

    #[tokio::test]
    async fn test_negative_total_rejected_before_write() {
        let (db, product) = setup().await;
        let shift = open_shift(&db).await;
        db.ledger().record_entry(&product.id, Location::Gym, 5, ADMIN, None).await.unwrap();

        let mut request = sale(&product.id, &shift.id, 1);
        request.line = request.line.with_discount(Money::from_major(50));

        let err = db.ledger().record_sale(&request, CASHIER).await.unwrap_err();
        assert_eq!(domain(err), CoreError::InvalidTotal { total_cents: -500 });
        assert_eq!(stock(&db, &product.id).await, (5, 0));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_with_one_compensating_row() {
        let (db, product) = setup().await;
        let shift = open_shift(&db).await;
        let ledger = db.ledger();
        ledger.record_entry(&product.id, Location::Gym, 5, ADMIN, None).await.unwrap();
        let before = stock(&db, &product.id).await;

        let sold = ledger.record_sale(&sale(&product.id, &shift.id, 2), CASHIER).await.unwrap();
        let cancellation = ledger.cancel_sale(&sold.id, "customer changed mind", "manager-1").await.unwrap();

        assert_eq!(stock(&db, &product.id).await, before);
        assert!(cancellation.sale.is_cancelled);
        assert_eq!(cancellation.compensation.movement_type, MovementType::Entry);
        assert_eq!(cancellation.compensation.quantity, 2);
        assert_eq!(cancellation.compensation.location, Location::Gym);
        assert_eq!(cancellation.compensation.reverses_movement_id.as_deref(), Some(sold.id.as_str()));

        let stored = ledger.get_movement(&sold.id).await.unwrap().unwrap();
        assert!(stored.is_cancelled);
        assert_eq!(stored.cancellation_reason.as_deref(), Some("customer changed mind"));
        assert_eq!(stored.cancelled_by.as_deref(), Some("manager-1"));
        assert_eq!(stored.quantity, -2);

        // entry + sale + compensation
        let history = ledger.query_by_product(&product.id, 10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().filter(|m| m.reverses_movement_id.is_some()).count(), 1);

        let err = ledger.cancel_sale(&sold.id, "again", "manager-1").await.unwrap_err();
        assert_eq!(domain(err), CoreError::AlreadyCancelled { movement_id: sold.id.clone() });
        assert_eq!(ledger.query_by_product(&product.id, 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_rejections() {
        let (db, product) = setup().await;
        let shift = open_shift(&db).await;
        let ledger = db.ledger();
        let entry = ledger.record_entry(&product.id, Location::Gym, 5, ADMIN, None).await.unwrap();
        let sold = ledger.record_sale(&sale(&product.id, &shift.id, 1), CASHIER).await.unwrap();

        let err = ledger.cancel_sale("missing", "x", ADMIN).await.unwrap_err();
        assert!(matches!(domain(err), CoreError::NotFound { .. }));

        let err = ledger.cancel_sale(&entry.id, "x", ADMIN).await.unwrap_err();
        assert_eq!(
            domain(err),
            CoreError::NotASale {
                movement_id: entry.id.clone(),
                movement_type: MovementType::Entry,
            }
        );

        let err = ledger.cancel_sale(&sold.id, "  ", ADMIN).await.unwrap_err();
        assert_eq!(domain(err), CoreError::MissingJustification);

        db.shifts().close_shift(&shift.id, &ShiftClose::default(), CASHIER).await.unwrap();
        let err = ledger.cancel_sale(&sold.id, "late refund", ADMIN).await.unwrap_err();
        assert_eq!(domain(err), CoreError::AlreadyClosed { shift_id: shift.id.clone() });
        assert_eq!(stock(&db, &product.id).await, (4, 0));
    }

    #[tokio::test]
    async fn test_ticket_is_all_or_nothing() {
        let (db, product) = setup().await;
        let shift = open_shift(&db).await;
        let ledger = db.ledger();
        ledger.record_entry(&product.id, Location::Gym, 3, ADMIN, None).await.unwrap();

        let lines = vec![
            SaleLine::new(&product.id, Location::Gym, 2, Money::from_major(45)),
            SaleLine::new(&product.id, Location::Gym, 2, Money::from_major(45)),
        ];
        let err = ledger
            .record_ticket(&shift.id, "T-9", PaymentMethod::Debit, None, &lines, CASHIER)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::InsufficientStock { available: 1, .. }));
        assert_eq!(stock(&db, &product.id).await, (3, 0));
        assert!(ledger.query_by_ticket("T-9").await.unwrap().is_empty());

        let rows = ledger
            .record_ticket(&shift.id, "T-9", PaymentMethod::Debit, None, &lines[..1], CASHIER)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].payment_method, Some(PaymentMethod::Debit));

        let err = ledger
            .record_ticket(&shift.id, "T-10", PaymentMethod::Cash, None, &[], CASHIER)
            .await
            .unwrap_err();
        assert!(matches!(domain(err), CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_ticket() {
        let (db, product) = setup().await;
        let shift = open_shift(&db).await;
        let ledger = db.ledger();
        ledger.record_entry(&product.id, Location::Gym, 6, ADMIN, None).await.unwrap();

        let lines = vec![
            SaleLine::new(&product.id, Location::Gym, 1, Money::from_major(45)),
            SaleLine::new(&product.id, Location::Gym, 2, Money::from_major(40)),
        ];
        let rows = ledger
            .record_ticket(&shift.id, "T-5", PaymentMethod::Cash, None, &lines, CASHIER)
            .await
            .unwrap();
        ledger.cancel_sale(&rows[0].id, "wrong flavor", ADMIN).await.unwrap();

        // Only the live line is cancelled
        let cancelled = ledger.cancel_ticket("T-5", "customer left", ADMIN).await.unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].sale.id, rows[1].id);
        assert_eq!(stock(&db, &product.id).await, (6, 0));

        let err = ledger.cancel_ticket("T-5", "again", ADMIN).await.unwrap_err();
        assert!(matches!(domain(err), CoreError::AlreadyCancelled { .. }));

        let err = ledger.cancel_ticket("T-404", "x", ADMIN).await.unwrap_err();
        assert!(matches!(domain(err), CoreError::NotFound { .. }));

        assert!(ledger.sales_for_shift(&shift.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queries_order_and_bounds() {
        let (db, product) = setup().await;
        let ledger = db.ledger();
        let first = ledger.record_entry(&product.id, Location::Warehouse, 10, ADMIN, None).await.unwrap();
        let transfer = ledger
            .record_transfer(&product.id, Location::Warehouse, Location::Gym, 4, ADMIN, None)
            .await
            .unwrap();
        let last = ledger.record_entry(&product.id, Location::Gym, 1, ADMIN, None).await.unwrap();

        let newest_first = ledger.query_by_product(&product.id, 10).await.unwrap();
        let ids: Vec<&str> = newest_first.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                last.id.as_str(),
                transfer.inbound.id.as_str(),
                transfer.outbound.id.as_str(),
                first.id.as_str()
            ]
        );
        assert_eq!(ledger.query_by_product(&product.id, 2).await.unwrap().len(), 2);

        // Both bounds inclusive
        let range = ledger.query_by_date_range(first.occurred_at, last.occurred_at).await.unwrap();
        assert_eq!(range.len(), 4);
        assert_eq!(range[0].id, first.id);
        assert_eq!(range[3].id, last.id);

        let only_last = ledger.query_by_date_range(last.occurred_at, last.occurred_at).await.unwrap();
        assert_eq!(only_last.len(), 1);
    }

    // =========================================================================
    // Concurrent registers (file-backed, one connection per task)
    // =========================================================================

    async fn file_db(dir: &tempfile::TempDir) -> Database {
        Database::new(DbConfig::new(dir.path().join("gym.db")).max_connections(8))
            .await
            .unwrap()
    }

    async fn sell_concurrently(db: &Database, product_id: &str, shift_id: &str, registers: usize) -> Vec<DbResult<Movement>> {
        let mut handles = Vec::with_capacity(registers);
        for register in 0..registers {
            let ledger = db.ledger();
            let mut request = sale(product_id, shift_id, 1);
            request.ticket_id = format!("REG{register}-0001");
            handles.push(tokio::spawn(async move { ledger.record_sale(&request, CASHIER).await }));
        }

        let mut results = Vec::with_capacity(registers);
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;
        let product = db
            .products()
            .create(&NewProduct {
                sku: "WATER-600".to_string(),
                name: "Water 600ml".to_string(),
                category: ProductCategory::Beverage,
                price_cents: 1_500,
                min_stock: 0,
            })
            .await
            .unwrap();
        db.ledger().record_entry(&product.id, Location::Gym, 100, ADMIN, None).await.unwrap();
        let shift = open_shift(&db).await;

        let results = sell_concurrently(&db, &product.id, &shift.id, 8).await;

        for result in &results {
            assert!(result.is_ok(), "sale failed: {:?}", result);
        }
        assert_eq!(stock(&db, &product.id).await, (92, 0));
        assert_eq!(db.ledger().sales_for_shift(&shift.id).await.unwrap().len(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_of_last_unit() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_db(&dir).await;
        let product = db
            .products()
            .create(&NewProduct {
                sku: "TOWEL-LAST".to_string(),
                name: "Towel".to_string(),
                category: ProductCategory::Apparel,
                price_cents: 12_000,
                min_stock: 0,
            })
            .await
            .unwrap();
        db.ledger().record_entry(&product.id, Location::Gym, 1, ADMIN, None).await.unwrap();
        let shift = open_shift(&db).await;

        let results = sell_concurrently(&db, &product.id, &shift.id, 8).await;

        let sold = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(sold, 1);
        for err in results.into_iter().filter_map(Result::err) {
            assert!(matches!(domain(err), CoreError::InsufficientStock { available: 0, .. }));
        }
        assert_eq!(stock(&db, &product.id).await, (0, 0));
    }

    #[tokio::test]
    async fn test_locked_database_reports_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gym.db");
        let db = file_db(&dir).await;
        let product = db
            .products()
            .create(&NewProduct {
                sku: "LOCK-1".to_string(),
                name: "Padlock".to_string(),
                category: ProductCategory::Accessory,
                price_cents: 9_000,
                min_stock: 0,
            })
            .await
            .unwrap();

        // Another process holds the write lock
        let mut holder = db.pool().acquire().await.unwrap();
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *holder).await.unwrap();

        let impatient = Database::new(
            DbConfig::new(&path)
                .busy_timeout(std::time::Duration::from_millis(50))
                .run_migrations(false),
        )
        .await
        .unwrap();
        let err = impatient
            .ledger()
            .record_entry(&product.id, Location::Gym, 1, ADMIN, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Busy(_)), "got {err:?}");

        sqlx::query("ROLLBACK").execute(&mut *holder).await.unwrap();
        drop(holder);
        impatient
            .ledger()
            .record_entry(&product.id, Location::Gym, 1, ADMIN, None)
            .await
            .unwrap();
        assert_eq!(stock(&db, &product.id).await, (1, 0));
    }
}
