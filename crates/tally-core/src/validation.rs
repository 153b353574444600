//! # Validation Module
//!
//! Input validation for engine operations.
//!
//! ## Validation Strategy
//! Validation runs before any mutating statement, so a failed call never
//! leaves partial writes. The database adds a second line of defense with
//! NOT NULL / foreign key constraints, but domain rules live here.

use crate::error::{ValidationError, ValidationResult};
use crate::MAX_ITEM_QUANTITY;

/// Validates an entity id (order, product, business, ...): non-empty after
/// trimming.
pub fn validate_id(field: &'static str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(())
}

/// Validates a line-item quantity: strictly positive, bounded.
///
/// The upper bound guards against typos (1000 instead of 10), same
/// reasoning as any till UI.
pub fn validate_item_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive { field: "quantity" });
    }
    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity",
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a payment or refund amount: strictly positive cents.
pub fn validate_amount(field: &'static str, amount_cents: i64) -> ValidationResult<()> {
    if amount_cents <= 0 {
        return Err(ValidationError::MustBePositive { field });
    }
    Ok(())
}

/// Validates a manual money input (tip, discount): non-negative cents.
pub fn validate_non_negative(field: &'static str, amount_cents: i64) -> ValidationResult<()> {
    if amount_cents < 0 {
        return Err(ValidationError::MustBePositive { field });
    }
    Ok(())
}

/// Validates a stock-change quantity: a zero delta is a meaningless ledger
/// entry and is rejected.
pub fn validate_stock_delta(quantity_milli: i64) -> ValidationResult<()> {
    if quantity_milli == 0 {
        return Err(ValidationError::MustBeNonZero { field: "quantity" });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
