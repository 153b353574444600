//! # Domain Types
//!
//! Core domain types for the order fulfillment and stock ledger engine.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │   OrderItem     │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  status         │   │  snap_* fields  │   │  method         │       │
//! │  │  derived totals │   │  line_total     │   │  is_refund      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  StockChange    │   │   StockLevel    │   │    Product      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  signed delta   │   │  derived cache  │   │  referenced     │       │
//! │  │  append-only    │   │  per product    │   │  by id only     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `snap_*` fields freeze catalog pricing at add-time so later menu edits
//! never retroactively change historical orders.
//!
//! ## Derived Money Fields
//! All monetary columns on [`Order`] are derived by the totals calculator,
//! never set directly by callers — except the tip and manual discount
//! (manual inputs) and payments (appended facts).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, Quantity};

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order.
///
/// `Open` is the only mutable state. Terminal states are reached through
/// payment reconciliation (`Paid`, `Refunded`) or an explicit cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Open,
    Paid,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Whether the order can still be mutated (items, totals, waiter).
    #[inline]
    pub const fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Open)
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Open
    }
}

// =============================================================================
// Order Item Status
// =============================================================================

/// Status of a line item.
///
/// `Pending` items are fully replaceable on each items-update call; `Sent`
/// items are immutable and have deducted stock exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderItemStatus {
    Pending,
    Sent,
    Voided,
}

impl Default for OrderItemStatus {
    fn default() -> Self {
        OrderItemStatus::Pending
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment through the external processor.
    Card,
    /// Single-use gift card redeemed through the gift-card collaborator.
    GiftCard,
}

// =============================================================================
// Stock Change Kind
// =============================================================================

/// Why a ledger entry exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum StockChangeKind {
    /// Goods received (positive quantities).
    Supply,
    /// Consumed by fulfillment (negative quantities).
    Usage,
    /// Manual stock-take correction (either sign).
    Adjustment,
    /// Spoilage / breakage (negative quantities).
    Waste,
}

// =============================================================================
// Product
// =============================================================================

/// A product referenced by the stock ledger.
///
/// Products are owned by the external catalog admin screens; the engine only
/// validates references and tracks stock against them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: String,
    pub business_id: String,
    pub name: String,
    /// Unit of measure for stock quantities ("kg", "l", "unit", ...).
    pub unit: String,
    /// Soft-delete flag.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Stock Ledger
// =============================================================================

/// An immutable stock ledger entry: one signed quantity delta for a product.
///
/// Soft-deletable (`deleted_at`) as a reversal, never a hard delete.
/// Invariant: the sum of non-deleted entries' quantities for a product
/// equals that product's current [`StockLevel`] quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockChange {
    pub id: String,
    pub product_id: String,
    pub business_id: String,
    /// Signed delta in milli-units.
    pub quantity_milli: i64,
    pub kind: StockChangeKind,
    pub expiration_date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Set when the entry has been reversed.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl StockChange {
    /// Returns the quantity delta as a [`Quantity`].
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }

    /// Whether this entry still counts towards the stock level.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Derived stock-quantity cache: one row per product.
///
/// Never the source of truth — always re-derivable by replaying non-deleted
/// [`StockChange`] entries. Created lazily on first change; updated in the
/// same transaction as every ledger write.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockLevel {
    pub product_id: String,
    pub business_id: String,
    pub quantity_milli: i64,
    pub updated_at: DateTime<Utc>,
}

impl StockLevel {
    #[inline]
    pub fn quantity(&self) -> Quantity {
        Quantity::from_milli(self.quantity_milli)
    }
}

// =============================================================================
// Order
// =============================================================================

/// An open or closed order. All money fields are in cents.
///
/// Exactly one `Open` order may exist per `(business_id, table_id)` at a
/// time, enforced at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub business_id: String,
    pub table_id: Option<String>,
    /// Waiter currently serving the order.
    pub served_by: Option<String>,
    pub status: OrderStatus,
    pub items_total_cents: i64,
    pub total_tax_cents: i64,
    pub total_tip_cents: i64,
    /// Discount entered by staff via `update_totals`.
    pub manual_discount_cents: i64,
    /// Manual discount plus the auto-applied discount at last recompute.
    pub total_discount_cents: i64,
    pub total_amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on the transition to a terminal status.
    pub closed_at: Option<DateTime<Utc>>,
}

impl Order {
    #[inline]
    pub fn total_amount(&self) -> Money {
        Money::from_cents(self.total_amount_cents)
    }

    #[inline]
    pub fn items_total(&self) -> Money {
        Money::from_cents(self.items_total_cents)
    }
}

// =============================================================================
// Order Item
// =============================================================================

/// A line item in an order.
///
/// `unit_sale_price = snap_base_price + Σ snap variation adjustments` and
/// `line_total = unit_sale_price × quantity`, all frozen at add-time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub menu_item_id: String,
    /// Menu item name at add-time (frozen).
    pub snap_name: String,
    /// Base price at add-time (frozen).
    pub snap_base_price_cents: i64,
    /// Category tax rate at add-time, basis points (frozen).
    pub snap_tax_rate_bps: u32,
    pub unit_sale_price_cents: i64,
    pub quantity: i64,
    pub status: OrderItemStatus,
    pub line_total_cents: i64,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }

    /// Whether this line still counts towards totals.
    #[inline]
    pub fn counts_towards_totals(&self) -> bool {
        self.status != OrderItemStatus::Voided
    }
}

/// A snapshotted variation applied to a line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItemVariation {
    pub id: String,
    pub order_item_id: String,
    pub menu_item_variation_id: String,
    pub snap_variation_name: String,
    pub snap_price_adjustment_cents: i64,
}

// =============================================================================
// Payment
// =============================================================================

/// An immutable payment fact.
///
/// Payments are never updated or deleted; refunds are separate rows with
/// `is_refund = true`. Order status is derived from the payment set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Processor intent/charge id for card payments, gift-card code for
    /// gift-card payments.
    pub external_reference_id: Option<String>,
    pub is_refund: bool,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Aggregates
// =============================================================================

/// A line item with its variations — what callers see.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemDetail {
    #[serde(flatten)]
    pub item: OrderItem,
    pub variations: Vec<OrderItemVariation>,
}

/// The full order aggregate returned by every order/payment operation, so
/// callers never need a separate re-fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItemDetail>,
    pub payments: Vec<Payment>,
}

impl OrderDetail {
    /// Sum of non-refund payment amounts.
    pub fn total_paid(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| !p.is_refund)
            .map(Payment::amount)
            .sum()
    }

    /// Sum of refund payment amounts.
    pub fn total_refunded(&self) -> Money {
        self.payments
            .iter()
            .filter(|p| p.is_refund)
            .map(Payment::amount)
            .sum()
    }

    /// Amount still payable: `total_amount − total_paid`, clamped to zero.
    pub fn remaining_balance(&self) -> Money {
        (self.order.total_amount() - self.total_paid()).clamp_zero()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
