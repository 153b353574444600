//! # Error Types
//!
//! Domain-specific error types for the engine.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core errors (this file)                                          │
//! │  ├── EngineError      - Caller-facing error taxonomy                    │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  tally-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  Flow: ValidationError → EngineError ← DbError (via From)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (entity, id)
//! 3. Errors are enum variants, never String
//! 4. Every variant exposes a stable machine-readable `kind()` so the
//!    (external) HTTP layer can map errors without parsing messages

use thiserror::Error;

// =============================================================================
// Engine Error
// =============================================================================

/// The engine's caller-facing error taxonomy.
///
/// Validation errors are raised *before* any mutating statement runs, so a
/// failed call never leaves partial writes. The only two cases where an
/// apparently-invalid call is coerced into a no-op are the documented
/// idempotent ones: duplicate order creation for a table and a duplicate
/// card-payment webhook.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A referenced catalog entity (product, menu item, variation) is
    /// unknown or deleted for the business.
    #[error("invalid reference: {entity} {id} not available for this business")]
    InvalidReference { entity: &'static str, id: String },

    /// The operation is illegal for the order's current status.
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },

    /// A competing write already claimed the value (e.g. bulk-reverse
    /// touching an already-reversed ledger row).
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// Entity absent for the given business scope. Scoping by business id is
    /// enforced on every lookup to prevent cross-tenant access.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// External payment-processor call failed. Propagated unchanged, no
    /// automatic retry inside the engine.
    #[error("payment processor error: {0}")]
    ExternalProcessor(String),

    /// Input validation failure.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage-layer failure (connection, migration, unexpected SQL error).
    #[error("storage error: {0}")]
    Storage(String),
}

impl EngineError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidReference { .. } => "invalid_reference",
            EngineError::InvalidState { .. } => "invalid_state",
            EngineError::Conflict { .. } => "conflict",
            EngineError::NotFound { .. } => "not_found",
            EngineError::ExternalProcessor(_) => "external_processor",
            EngineError::Validation(_) => "validation",
            EngineError::Storage(_) => "storage",
        }
    }

    /// Creates an InvalidReference error.
    pub fn invalid_reference(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::InvalidReference {
            entity,
            id: id.into(),
        }
    }

    /// Creates an InvalidState error.
    pub fn invalid_state(reason: impl Into<String>) -> Self {
        EngineError::InvalidState {
            reason: reason.into(),
        }
    }

    /// Creates a Conflict error.
    pub fn conflict(reason: impl Into<String>) -> Self {
        EngineError::Conflict {
            reason: reason.into(),
        }
    }

    /// Creates a NotFound error.
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        EngineError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Detected before business logic runs; no mutation has happened by the time
/// one of these is raised.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: &'static str },

    /// Value must not be zero (a zero-quantity ledger entry is meaningless).
    #[error("{field} must not be zero")]
    MustBeNonZero { field: &'static str },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Convenience alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

/// Convenience alias for validation Results.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::not_found("Order", "abc-123");
        assert_eq!(err.to_string(), "Order not found: abc-123");

        let err = EngineError::invalid_state("order is cancelled");
        assert_eq!(err.to_string(), "invalid state: order is cancelled");
    }

    #[test]
    fn test_kinds_are_stable() {
        assert_eq!(
            EngineError::invalid_reference("Product", "p1").kind(),
            "invalid_reference"
        );
        assert_eq!(EngineError::invalid_state("x").kind(), "invalid_state");
        assert_eq!(EngineError::conflict("x").kind(), "conflict");
        assert_eq!(EngineError::not_found("Order", "o1").kind(), "not_found");
        assert_eq!(
            EngineError::ExternalProcessor("down".into()).kind(),
            "external_processor"
        );
        assert_eq!(EngineError::Storage("io".into()).kind(), "storage");
    }

    #[test]
    fn test_validation_converts_to_engine_error() {
        let err: EngineError = ValidationError::MustBePositive { field: "amount" }.into();
        assert_eq!(err.kind(), "validation");
        assert_eq!(err.to_string(), "validation error: amount must be positive");
    }
}
