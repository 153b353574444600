//! # tally-db: Database Layer & Transactional Services
//!
//! SQLite persistence and the service layer for the order fulfillment and
//! stock ledger engine.
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
//! │  │                ★ tally-db (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐  ┌──────────────┐  ┌──────────────┐         │   │
//! │  │   │   service    │  │  repository  │  │     pool     │         │   │
//! │  │   │ orders       │  │ OrderRepo    │  │  Database    │         │   │
//! │  │   │ payments     │  │ StockRepo    │  │  DbConfig    │         │   │
//! │  │   │ stock        │  │ ProductRepo  │  │  migrations  │         │   │
//! │  │   └──────────────┘  └──────────────┘  └──────────────┘         │   │
//! │  │                                                                 │   │
//! │  │   one ACID transaction per exposed operation                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               tally-core (pure business logic)                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("./tally.db")).await?;
//! let orders = OrderService::new(db.clone(), catalog, discounts);
//! let order = orders.create_for_table("biz-1", Some("table-4")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod testutil;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::{OrderRepo, ProductRepo, StockRepo};
pub use service::{
    AddPaymentInput, GiftCardRedeemer, OrderItemInput, OrderService, PaymentProcessor,
    PaymentService, StockChangeInput, StockService,
};

// =============================================================================
// End-to-End Tests
// =============================================================================
