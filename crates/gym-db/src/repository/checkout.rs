//! # Checkout
//!
//! Point-of-sale entry point: sells a ticket against whichever shift is open
//! right now. The ledger does the writing; this layer only resolves the shift
//! and the ticket id.

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use gym_core::sale::TicketRequest;
use gym_core::{CoreError, Money, Movement};

use crate::error::DbResult;
use crate::repository::ledger::{Cancellation, LedgerRepository};
use crate::repository::shift::ShiftRepository;

/// A committed checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub shift_id: String,
    pub lines: Vec<Movement>,
    pub total: Money,
}

#[derive(Debug, Clone)]
pub struct CheckoutService {
    shifts: ShiftRepository,
    ledger: LedgerRepository,
}

impl CheckoutService {
    pub fn new(shifts: ShiftRepository, ledger: LedgerRepository) -> Self {
        CheckoutService { shifts, ledger }
    }

    /// Sells every line of `request` under the open shift.
    ///
    /// ## Errors
    /// - `NoOpenShift` when no shift is open
    /// - anything [`LedgerRepository::record_ticket`] returns
    pub async fn sell(&self, request: &TicketRequest, user_id: &str) -> DbResult<Ticket> {
        let shift = self
            .shifts
            .get_active_shift()
            .await?
            .ok_or(CoreError::NoOpenShift)?;

        let ticket_id = match request.ticket_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_ticket_id(),
        };

        let lines = self
            .ledger
            .record_ticket(
                &shift.id,
                &ticket_id,
                request.payment_method,
                request.member_id.as_deref(),
                &request.lines,
                user_id,
            )
            .await?;

        let total: Money = lines.iter().map(Movement::total).sum();
        info!(
            ticket_id = %ticket_id,
            shift_id = %shift.id,
            lines = lines.len(),
            total = %total,
            "Ticket sold"
        );

        Ok(Ticket {
            ticket_id,
            shift_id: shift.id,
            lines,
            total,
        })
    }

    /// Voids a whole ticket.
    pub async fn cancel(&self, ticket_id: &str, reason: &str, user_id: &str) -> DbResult<Vec<Cancellation>> {
        self.ledger.cancel_ticket(ticket_id, reason, user_id).await
    }
}

/// Ticket ids handed out when the register doesn't supply one.
pub fn generate_ticket_id() -> String {
    format!("T-{}", Uuid::new_v4().simple())
}
