//! Core types for stockledger
//!
//! This crate provides the plain data types shared by the store, costing and
//! movement crates:
//!
//! - [`Bucket`] / [`BucketQuantities`] - The five inventory status buckets
//! - [`BalanceKey`] - Item, location, batch/serial, plant and organization
//! - [`BalanceRecord`] - One versioned balance row
//! - [`PlantStockBalance`] - Derived per-plant aggregate
//! - [`FifoLayer`] / [`WeightedAverageRecord`] - Costing records
//! - [`PendingAllocation`] - Staged, uncommitted document-line allocations
//! - [`LedgerError`] - The error taxonomy with stable codes
//!
//! # Example
//!
//! ```
//! use stockledger_core::{BalanceKey, BalanceRecord, Bucket, DeltaPolicy};
//! use rust_decimal_macros::dec;
//!
//! let mut row = BalanceRecord::zero(BalanceKey::new("M-100", "WH1"));
//! row.apply_delta(Bucket::QualityInspection, dec!(40), DeltaPolicy::Strict).unwrap();
//!
//! // Putaway: inspection stock becomes usable
//! row.move_bucket(Bucket::QualityInspection, Bucket::Unrestricted, dec!(25)).unwrap();
//!
//! assert_eq!(row.get(Bucket::Unrestricted), dec!(25));
//! assert_eq!(row.balance_quantity, dec!(40));
//!
//! // Underflow is rejected, never clamped
//! assert!(row.apply_delta(Bucket::Unrestricted, dec!(-30), DeltaPolicy::Strict).is_err());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod allocation;
pub mod balance;
pub mod batch;
pub mod bucket;
pub mod costing;
pub mod error;
pub mod key;
pub mod round;

pub use allocation::{AllocationLine, AllocationPayload, AllocationSlot, PendingAllocation};
pub use balance::{BalanceRecord, DeltaPolicy, PlantStockBalance};
pub use batch::{generated_batch_number, Batch, NewBatch};
pub use bucket::{Bucket, BucketQuantities};
pub use costing::{CostingMethod, CostingScope, FifoLayer, RecordId, WeightedAverageRecord};
pub use error::{ErrorCode, LedgerError, LedgerResult, Severity};
pub use key::{BalanceKey, Granularity};
pub use round::{round_cost, round_qty, COST_SCALE, QTY_SCALE};

// Re-export commonly used external types
pub use chrono::NaiveDateTime;
pub use rust_decimal::Decimal;
