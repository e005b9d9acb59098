//! # gym-db: Database Layer for the Gym Back-Office
//!
//! SQLite storage for the inventory ledger, product stock and cash-register
//! shifts, built on sqlx. All invariants that must survive concurrent
//! writers (non-negative stock, one open shift, immutable movements) are
//! enforced by guarded statements and schema constraints here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Collaborator (HTTP handler, CLI, seed binary)                          │
//! │       │  user_id already authenticated                                  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     gym-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ ledger, shift │    │  (embedded)  │  │   │
//! │  │   │ SqlitePool    │◄───│ product,      │    │ 001_initial  │  │   │
//! │  │   │ WAL, FKs      │    │ report        │    │ _schema.sql  │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │ pure math                      │   │
//! │  │                                ▼                                │   │
//! │  │                     gym-core (reconcile, kardex)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - `backoffice.toml` + environment overrides, tracing setup
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gym_db::{BackOfficeConfig, Database};
//!
//! let config = BackOfficeConfig::load(None)?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let shift = db.shifts().open_shift("cashier-1", Money::from_major(500)).await?;
//! let ticket = db.checkout().sell(&request, "cashier-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{init_tracing, BackOfficeConfig, ConfigError};
pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::checkout::{CheckoutService, Ticket};
pub use repository::ledger::{Cancellation, LedgerRepository, TransferRecord};
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::shift::{ClosedShift, ShiftReport, ShiftRepository};
