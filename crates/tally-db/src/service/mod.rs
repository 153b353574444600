//! # Service Layer
//!
//! One service per area of the engine, each method one exposed operation
//! running in exactly one database transaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Service Layer                                    │
//! │                                                                         │
//! │  OrderService    - order lifecycle, items, totals, fulfillment          │
//! │  PaymentService  - payment facts, status derivation, refunds            │
//! │  StockService    - ledger writes, reversals, level reads                │
//! │                                                                         │
//! │  Validation ─► load ─► pure decision (tally-core) ─► write ─► commit    │
//! │                                                                         │
//! │  External collaborators cross the seam as traits so tests script them:  │
//! │    PaymentProcessor  - card intents and processor-side refunds          │
//! │    GiftCardRedeemer  - single-use gift card validation                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! External calls (processor, gift cards) happen BEFORE the corresponding
//! facts are written, inside the open transaction: a processor failure rolls
//! everything back and no payment row survives.

use async_trait::async_trait;
use tally_core::EngineResult;

pub mod orders;
pub mod payments;
pub mod stock;

pub use orders::{OrderItemInput, OrderService};
pub use payments::{AddPaymentInput, PaymentService};
pub use stock::{StockChangeInput, StockService};

// =============================================================================
// External Collaborators
// =============================================================================

/// The external card payment processor.
///
/// The engine never retries these calls; a failure surfaces as
/// `EngineError::ExternalProcessor` and rolls back the transaction.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Creates a payment intent for a card payment initiated in-house and
    /// returns the processor's reference id.
    async fn create_intent(&self, order_id: &str, amount_cents: i64) -> EngineResult<String>;

    /// Refunds part or all of a previously captured card payment.
    async fn refund_payment(
        &self,
        external_reference_id: &str,
        amount_cents: i64,
    ) -> EngineResult<()>;
}

/// The external gift card system.
#[async_trait]
pub trait GiftCardRedeemer: Send + Sync {
    /// Validates a gift card code and redeems it (single use), returning the
    /// card's value in cents.
    async fn validate_and_redeem(&self, business_id: &str, code: &str) -> EngineResult<i64>;
}

// Shared collaborators are usually held behind an Arc.
#[async_trait]
impl<T: PaymentProcessor + ?Sized> PaymentProcessor for std::sync::Arc<T> {
    async fn create_intent(&self, order_id: &str, amount_cents: i64) -> EngineResult<String> {
        (**self).create_intent(order_id, amount_cents).await
    }

    async fn refund_payment(
        &self,
        external_reference_id: &str,
        amount_cents: i64,
    ) -> EngineResult<()> {
        (**self).refund_payment(external_reference_id, amount_cents).await
    }
}

#[async_trait]
impl<T: GiftCardRedeemer + ?Sized> GiftCardRedeemer for std::sync::Arc<T> {
    async fn validate_and_redeem(&self, business_id: &str, code: &str) -> EngineResult<i64> {
        (**self).validate_and_redeem(business_id, code).await
    }
}
