//! # Payment Reconciliation (pure rules)
//!
//! The decision half of the payment state machine: everything here is a
//! pure function over the order's payment facts, so the rules are testable
//! without a store or a processor. The transactional half (appending facts,
//! calling the processor) lives in `tally-db::service::payments`.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   OPEN ──(total_paid ≥ total_amount)──► PAID                            │
//! │    │                                      │                             │
//! │    └──(cancel, no payments)──► CANCELLED  │                             │
//! │                                           ▼                             │
//! │                       (any refund fact) REFUNDED                        │
//! │                                                                         │
//! │   A refund is an additional payment fact, not a state revert; status    │
//! │   becomes REFUNDED once any refund exists, even a partial one.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::money::Money;
use crate::types::{OrderStatus, Payment, PaymentMethod};
use std::collections::HashMap;

// =============================================================================
// Status Derivation
// =============================================================================

/// Derives the order status from its payment set.
///
/// Terminal statuses are monotonic in practice: once refunded the order
/// stays refunded, and a cancelled order is never re-derived (cancellation
/// forbids payments in the first place).
pub fn derive_status(current: OrderStatus, total_amount: Money, payments: &[Payment]) -> OrderStatus {
    if current == OrderStatus::Cancelled {
        return current;
    }

    let total_refunded: Money = payments
        .iter()
        .filter(|p| p.is_refund)
        .map(Payment::amount)
        .sum();
    if total_refunded.is_positive() {
        return OrderStatus::Refunded;
    }

    let total_paid: Money = payments
        .iter()
        .filter(|p| !p.is_refund)
        .map(Payment::amount)
        .sum();
    if total_paid >= total_amount && (total_paid.is_positive() || total_amount.is_zero()) {
        return OrderStatus::Paid;
    }

    current
}

/// Idempotent webhook guard: does a non-refund payment with this external
/// reference already exist?
///
/// Protects against duplicate payment-webhook delivery for card payments.
pub fn has_card_payment_with_reference(payments: &[Payment], external_reference_id: &str) -> bool {
    payments.iter().any(|p| {
        !p.is_refund
            && p.method == PaymentMethod::Card
            && p.external_reference_id.as_deref() == Some(external_reference_id)
    })
}

/// Amount of a gift card actually applied to an order: never more than owed,
/// never more than the card holds.
pub fn gift_card_applicable(card_value: Money, remaining_balance: Money) -> Money {
    card_value.min(remaining_balance).clamp_zero()
}

// =============================================================================
// Refund Fan-Out
// =============================================================================

/// One processor-side refund against a specific card payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRefund {
    /// The original card payment being (partially) refunded.
    pub payment_id: String,
    /// Processor reference to refund against.
    pub external_reference_id: String,
    pub amount: Money,
}

/// How a requested refund splits across payment rails.
///
/// Invariants (see tests):
/// * `Σ card_refunds.amount + cash_refund == requested`
/// * `Σ card_refunds.amount ≤ total card paid − total card refunded`
/// * each card payment is refunded at most its own paid amount, counting
///   refunds already issued against its reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPlan {
    pub card_refunds: Vec<CardRefund>,
    /// Anything beyond what the processor can return goes back as cash.
    pub cash_refund: Money,
}

/// Plans a refund across card and cash rails.
///
/// Card payments are refunded individually, each up to its own paid amount
/// net of refunds already issued against its reference, in payment order,
/// stopping once the requested amount is exhausted. Card payments without a
/// processor reference cannot be refunded through the processor and fall
/// through to the cash remainder.
pub fn plan_refund(payments: &[Payment], requested: Money) -> RefundPlan {
    let mut remaining = requested.clamp_zero();
    let mut card_refunds = Vec::new();

    // What each processor reference has already returned, so repeated
    // partial refunds never ask a card for more than it collected.
    let mut refunded_by_reference: HashMap<&str, Money> = HashMap::new();
    for p in payments
        .iter()
        .filter(|p| p.is_refund && p.method == PaymentMethod::Card)
    {
        if let Some(reference) = p.external_reference_id.as_deref() {
            *refunded_by_reference.entry(reference).or_default() += p.amount();
        }
    }

    for p in payments.iter().filter(|p| {
        !p.is_refund && p.method == PaymentMethod::Card && p.external_reference_id.is_some()
    }) {
        if remaining.is_zero() {
            break;
        }
        let reference = p.external_reference_id.as_deref().unwrap_or_default();
        let already = refunded_by_reference
            .get(reference)
            .copied()
            .unwrap_or_default();
        let amount = (p.amount() - already).clamp_zero().min(remaining);
        if !amount.is_positive() {
            continue;
        }
        card_refunds.push(CardRefund {
            payment_id: p.id.clone(),
            external_reference_id: reference.to_string(),
            amount,
        });
        *refunded_by_reference.entry(reference).or_default() += amount;
        remaining -= amount;
    }

    RefundPlan {
        card_refunds,
        cash_refund: remaining,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
