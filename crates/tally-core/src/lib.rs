//! # tally-core: Pure Business Logic for the Order & Stock Ledger Engine
//!
//! This crate is the heart of the engine. It contains all business logic as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Architecture                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            HTTP layer / admin app (out of scope)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                tally-db (services + repositories)               │   │
//! │  │   one ACID transaction per exposed operation                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐  │   │
//! │  │   │   types   │  │   money   │  │  totals   │  │ reconcile  │  │   │
//! │  │   │  Order    │  │  Money    │  │ per-line  │  │  status    │  │   │
//! │  │   │  Payment  │  │  Quantity │  │   tax     │  │  refunds   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, OrderItem, Payment, StockChange, ...)
//! - [`money`] - Fixed-point `Money` (cents) and `Quantity` (milli-units)
//! - [`totals`] - Pure totals calculator with line-proportional discounts
//! - [`reconcile`] - Payment-set status derivation and refund planning
//! - [`catalog`] - Injected collaborator seams (menu, discounts)
//! - [`validation`] - Input validation rules
//! - [`error`] - The engine error taxonomy
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: deterministic — same input, same output
//! 2. **No I/O**: database, network and file system access are forbidden here
//! 3. **Integer Fixed-Point**: cents and milli-units, never floats
//! 4. **Explicit Errors**: typed errors with stable machine-readable kinds

// =============================================================================
// Module Declarations
// =============================================================================

pub mod catalog;
pub mod error;
pub mod money;
pub mod reconcile;
pub mod totals;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{EngineError, EngineResult, ValidationError};
pub use money::{Money, Quantity};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line item.
///
/// Guards against accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;
