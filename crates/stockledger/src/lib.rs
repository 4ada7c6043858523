//! Inventory balance and costing ledger CLI.
//!
//! The `stockledger` binary keeps ledger state in a JSON snapshot and reads
//! the item master from a JSON configuration file:
//!
//! - `stockledger receive`: Goods receipt into one balance row
//! - `stockledger issue`: Stock issue from one balance row
//! - `stockledger transfer`: Move stock between buckets or locations
//! - `stockledger commit`: Commit (or only validate) a document file
//! - `stockledger migrate`: Switch an item's costing ledger between FIFO and weighted average
//! - `stockledger rebuild`: Recompute plant aggregates
//! - `stockledger show`: Print balances, aggregates and costing state of an item
//!
//! # Example Usage
//!
//! ```bash
//! stockledger receive M-100 100 -l WH1 --cost 10
//! stockledger issue M-100 60 -l WH1
//! stockledger migrate M-100 "Weighted Average"
//! stockledger show M-100 --format json
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cmd;
pub mod config;
