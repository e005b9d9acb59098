//! # gym-core: Pure Business Logic for the Gym Back-Office
//!
//! This crate holds the domain model of the inventory ledger and the cash
//! register ("corte") reconciliation as pure functions with zero I/O.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Gym Back-Office Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Collaborators (HTTP, auth, UI) - out of scope          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ user_id, prices, member ids            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 gym-db (ledger, shifts, reports)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                ★ gym-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────────┐ ┌──────────────┐    │   │
//! │  │   │  types  │ │  money  │ │reconciliation│ │    kardex    │    │   │
//! │  │   │Movement │ │  Money  │ │  difference  │ │running balance│   │   │
//! │  │   │ Shift   │ │  cents  │ │  per method  │ │  low stock   │    │   │
//! │  │   └─────────┘ └─────────┘ └──────────────┘ └──────────────┘    │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Movement, Shift, enums)
//! - [`money`] - Money type with integer arithmetic (cents)
//! - [`error`] - Domain error taxonomy
//! - [`validation`] - Input checks run before any write
//! - [`sale`] - Sale line pricing
//! - [`reconciliation`] - Shift closing calculator
//! - [`kardex`] - Running-balance projection over the ledger
//!
//! ## Example Usage
//!
//! ```rust
//! use gym_core::money::Money;
//! use gym_core::sale::price_line;
//!
//! // 3 shakes at $45.00, $5.00 discount, no surcharge
//! let line = price_line(Money::from_major(45), 3, Money::from_major(5), Money::zero()).unwrap();
//! assert_eq!(line.total.cents(), 13_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod kardex;
pub mod money;
pub mod reconciliation;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default prefix for shift folios (`CORTE-20261017-001`).
pub const DEFAULT_FOLIO_PREFIX: &str = "CORTE";

/// Default number of movements retained in a kardex window.
pub const DEFAULT_KARDEX_LIMIT: u32 = 50;

/// Largest quantity a single movement may carry, in either direction.
pub const MAX_MOVEMENT_UNITS: i64 = 1_000_000;

/// Variance (in cents) tolerated before a shift difference is flagged.
///
/// A difference is significant when `|difference| > 0.01`, i.e. more
/// than one cent.
pub const SIGNIFICANT_DIFFERENCE_CENTS: i64 = 1;
