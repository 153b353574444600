//! # Repository Layer
//!
//! Data access per aggregate, one module per aggregate root.
//!
//! ## Transaction Discipline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Service operation                                                      │
//! │       │ db.begin()                                                      │
//! │       ▼                                                                 │
//! │  ┌───────────────── one transaction ─────────────────┐                  │
//! │  │  OrderRepo::get(&mut *tx, ...)                    │                  │
//! │  │  OrderRepo::insert_item(&mut *tx, ...)            │                  │
//! │  │  StockRepo::apply_level_delta(&mut *tx, ...)      │                  │
//! │  └───────────────────────────────────────────────────┘                  │
//! │       │ tx.commit()  — or implicit rollback on error                    │
//! │       ▼                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repository functions take `&mut SqliteConnection` instead of holding a
//! pool so the service layer decides transaction boundaries. Repositories
//! never begin or commit.

pub mod order;
pub mod product;
pub mod stock;

pub use order::OrderRepo;
pub use product::ProductRepo;
pub use stock::StockRepo;
