//! Ledger error taxonomy.
//!
//! | Code  | Error |
//! |-------|-------|
//! | L1001 | Insufficient balance in a bucket or weighted-average record |
//! | L1002 | Insufficient quantity across FIFO layers |
//! | L1003 | Invalid quantity (zero or negative where positive required) |
//! | L2001 | Invalid costing method |
//! | L2002 | Nothing to migrate |
//! | L3001 | Missing configuration / reference data |
//! | L3002 | Unknown inventory bucket |
//! | L4001 | Malformed pending allocation payload |
//! | L5001 | Concurrency conflict (version mismatch) |
//! | L5002 | Compensation failed, manual reconciliation required |

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

use crate::Bucket;

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// L1001
    InsufficientBalance,
    /// L1002
    InsufficientLayerQuantity,
    /// L1003
    InvalidQuantity,
    /// L2001
    InvalidCostingMethod,
    /// L2002
    NothingToMigrate,
    /// L3001
    MissingConfiguration,
    /// L3002
    UnknownBucket,
    /// L4001
    ParseFailure,
    /// L5001
    ConcurrencyConflict,
    /// L5002
    CompensationFailed,
}

impl ErrorCode {
    /// The code string (e.g. `"L1001"`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InsufficientBalance => "L1001",
            Self::InsufficientLayerQuantity => "L1002",
            Self::InvalidQuantity => "L1003",
            Self::InvalidCostingMethod => "L2001",
            Self::NothingToMigrate => "L2002",
            Self::MissingConfiguration => "L3001",
            Self::UnknownBucket => "L3002",
            Self::ParseFailure => "L4001",
            Self::ConcurrencyConflict => "L5001",
            Self::CompensationFailed => "L5002",
        }
    }

    /// Get the severity level.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::ParseFailure => Severity::Warning,
            Self::ConcurrencyConflict => Severity::Retryable,
            Self::CompensationFailed => Severity::Fatal,
            _ => Severity::Rejected,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How a caller should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Degrades gracefully; the operation continues.
    Warning,
    /// The operation was rejected and left state unchanged.
    Rejected,
    /// Safe to retry as-is.
    Retryable,
    /// State may be inconsistent and needs manual reconciliation.
    Fatal,
}

/// Errors raised by ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// A bucket or weighted-average record cannot satisfy a decrement.
    #[error("insufficient balance at {key} ({bucket:?}): requested {requested}, available {available}")]
    InsufficientBalance {
        /// Display form of the balance key or costing scope.
        key: String,
        /// Bucket being decremented (`None` for weighted-average quantity).
        bucket: Option<Bucket>,
        /// Quantity requested.
        requested: Decimal,
        /// Quantity available.
        available: Decimal,
    },

    /// FIFO layers cannot satisfy a consumption.
    #[error("insufficient FIFO layer quantity for {material_id}: requested {requested}, available {available}")]
    InsufficientLayerQuantity {
        /// Item whose layers were walked.
        material_id: String,
        /// Quantity requested.
        requested: Decimal,
        /// Total available across layers.
        available: Decimal,
    },

    /// A quantity that must be positive was not.
    #[error("invalid quantity {quantity}: {reason}")]
    InvalidQuantity {
        /// The offending quantity.
        quantity: Decimal,
        /// What was expected.
        reason: String,
    },

    /// Unsupported costing method string or migration target.
    #[error("invalid costing method: {0}")]
    InvalidCostingMethod(String),

    /// Migration source side holds no quantity.
    #[error("nothing to migrate for {material_id}: {reason}")]
    NothingToMigrate {
        /// Item being migrated.
        material_id: String,
        /// Which side was empty.
        reason: String,
    },

    /// Required reference data is absent.
    #[error("missing configuration: {0}")]
    MissingConfiguration(String),

    /// Category string outside the closed bucket set.
    #[error("unknown inventory category: {0:?}")]
    UnknownBucket(String),

    /// Pending allocation payload could not be parsed.
    #[error("malformed allocation payload: {0}")]
    ParseFailure(String),

    /// A write lost an optimistic-concurrency race.
    #[error("concurrency conflict on {key}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Display form of the contended key.
        key: String,
        /// Version the writer read.
        expected: u64,
        /// Version found at write time.
        actual: u64,
    },

    /// Reversal of a partially applied commit failed.
    #[error("compensation failed after {original}; manual reconciliation required ({} failure(s))", .failures.len())]
    CompensationFailed {
        /// The error that triggered compensation.
        original: Box<LedgerError>,
        /// Messages from the compensating writes that failed.
        failures: Vec<String>,
    },
}

impl LedgerError {
    /// The stable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InsufficientBalance { .. } => ErrorCode::InsufficientBalance,
            Self::InsufficientLayerQuantity { .. } => ErrorCode::InsufficientLayerQuantity,
            Self::InvalidQuantity { .. } => ErrorCode::InvalidQuantity,
            Self::InvalidCostingMethod(_) => ErrorCode::InvalidCostingMethod,
            Self::NothingToMigrate { .. } => ErrorCode::NothingToMigrate,
            Self::MissingConfiguration(_) => ErrorCode::MissingConfiguration,
            Self::UnknownBucket(_) => ErrorCode::UnknownBucket,
            Self::ParseFailure(_) => ErrorCode::ParseFailure,
            Self::ConcurrencyConflict { .. } => ErrorCode::ConcurrencyConflict,
            Self::CompensationFailed { .. } => ErrorCode::CompensationFailed,
        }
    }

    /// Shorthand for [`ErrorCode::severity`].
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.code().severity()
    }

    /// Build an [`LedgerError::InvalidQuantity`].
    pub fn invalid_quantity(quantity: Decimal, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            quantity,
            reason: reason.into(),
        }
    }

    /// Whether this is a version-mismatch error that may be retried.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_codes_are_unique() {
        let codes = [
            ErrorCode::InsufficientBalance,
            ErrorCode::InsufficientLayerQuantity,
            ErrorCode::InvalidQuantity,
            ErrorCode::InvalidCostingMethod,
            ErrorCode::NothingToMigrate,
            ErrorCode::MissingConfiguration,
            ErrorCode::UnknownBucket,
            ErrorCode::ParseFailure,
            ErrorCode::ConcurrencyConflict,
            ErrorCode::CompensationFailed,
        ];
        let mut seen: Vec<&str> = codes.iter().map(ErrorCode::code).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), codes.len());
    }

    #[test]
    fn test_display_insufficient_balance() {
        let err = LedgerError::InsufficientBalance {
            key: "M1@L1".to_string(),
            bucket: Some(Bucket::Unrestricted),
            requested: dec!(30),
            available: dec!(20),
        };
        let msg = err.to_string();
        assert!(msg.contains("M1@L1"));
        assert!(msg.contains("requested 30"));
        assert_eq!(err.code().code(), "L1001");
        assert_eq!(err.severity(), Severity::Rejected);
    }

    #[test]
    fn test_compensation_failed_is_fatal() {
        let err = LedgerError::CompensationFailed {
            original: Box::new(LedgerError::MissingConfiguration("item M1".to_string())),
            failures: vec!["reverse delta".to_string()],
        };
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(err.to_string().contains("1 failure(s)"));
    }
}
