//! # Repository Module
//!
//! Database repositories for the gym back-office.
//!
//! ## Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CheckoutService ──► LedgerRepository ──► stock::apply_delta            │
//! │        │                   │                    │                       │
//! │        ▼                   ▼                    ▼                       │
//! │  ShiftRepository      movements table      products.stock_*             │
//! │  (single open shift)  (append-only)        (guarded, never negative)    │
//! │                                                                         │
//! │  One transaction per operation: the movement rows and the stock        │
//! │  change commit together or not at all.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Catalog CRUD and search
//! - [`LedgerRepository`] - Entries, transfers, adjustments, sales, cancellations
//! - [`ShiftRepository`] - Opening and closing shifts
//! - [`ReportRepository`] - Stock snapshot, low stock, kardex
//! - [`CheckoutService`] - Ticket sales against the open shift
//!
//! [`ProductRepository`]: product::ProductRepository
//! [`LedgerRepository`]: ledger::LedgerRepository
//! [`ShiftRepository`]: shift::ShiftRepository
//! [`ReportRepository`]: report::ReportRepository
//! [`CheckoutService`]: checkout::CheckoutService

pub mod checkout;
pub mod ledger;
pub mod product;
pub mod report;
pub mod shift;
pub(crate) mod stock;
