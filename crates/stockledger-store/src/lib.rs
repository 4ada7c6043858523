//! Balance record store for stockledger.
//!
//! This crate defines the storage seams of the ledger and the single
//! race-free path every balance write goes through.
//!
//! # Features
//!
//! - Storage traits for balance rows, costing ledgers, batches and plant aggregates
//! - Versioned compare-and-swap writes (a stale version is a
//!   [`LedgerError::ConcurrencyConflict`])
//! - [`BalanceLedger`] with `apply_delta` / `move_bucket` and optimistic retry
//! - [`MemoryStore`], an in-process implementation of every trait
//! - JSON snapshots of a [`MemoryStore`]
//!
//! # Example
//!
//! ```
//! use stockledger_core::{BalanceKey, Bucket, DeltaPolicy};
//! use stockledger_store::{BalanceLedger, MemoryStore};
//! use rust_decimal_macros::dec;
//!
//! let store = MemoryStore::new();
//! let ledger = BalanceLedger::new(&store);
//! let key = BalanceKey::new("M-100", "WH1");
//!
//! ledger.apply_delta(&key, Bucket::Unrestricted, dec!(100), DeltaPolicy::Strict).unwrap();
//! let row = ledger.apply_delta(&key, Bucket::Unrestricted, dec!(-60), DeltaPolicy::Strict).unwrap();
//! assert_eq!(row.balance_quantity, dec!(40));
//! assert_eq!(row.version, 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod costing_state;
mod ledger;
mod memory;
mod retry;
pub mod snapshot;

pub use costing_state::CostingState;
pub use ledger::BalanceLedger;
pub use memory::MemoryStore;
pub use retry::{retry_on_conflict, DEFAULT_MAX_WRITE_ATTEMPTS};
pub use snapshot::{Snapshot, SnapshotError};

use stockledger_core::{
    BalanceKey, BalanceRecord, Batch, CostingScope, LedgerResult, NewBatch, PlantStockBalance,
    RecordId,
};

/// Versioned storage of balance rows (all three granularities).
///
/// Writes are compare-and-swap: [`put_balance`](Self::put_balance) succeeds
/// only if the stored version still equals the version carried by the
/// record, which is the version the writer read (0 for an absent row).
pub trait BalanceStore: Send + Sync {
    /// Current row for a key, if it was ever written.
    fn get_balance(&self, key: &BalanceKey) -> LedgerResult<Option<BalanceRecord>>;

    /// Write a row if its version is current; returns the stored row with
    /// its version incremented.
    fn put_balance(&self, record: BalanceRecord) -> LedgerResult<BalanceRecord>;

    /// All rows of an item, any granularity.
    fn balances_for_item(&self, material_id: &str) -> LedgerResult<Vec<BalanceRecord>>;

    /// Every item that has at least one balance row.
    fn balance_items(&self) -> LedgerResult<Vec<String>>;
}

/// Versioned storage of per-scope costing ledgers.
pub trait CostingStore: Send + Sync {
    /// Costing state of a scope; an empty state at version 0 when absent.
    fn load_costing(&self, scope: &CostingScope) -> LedgerResult<CostingState>;

    /// Write a costing state if its version is current; returns the stored
    /// state with its version incremented.
    fn store_costing(&self, state: CostingState) -> LedgerResult<CostingState>;

    /// A fresh record id for a FIFO layer or weighted-average record.
    fn next_record_id(&self) -> RecordId;

    /// Every scope with stored costing state.
    fn costing_scopes(&self) -> LedgerResult<Vec<CostingScope>>;
}

/// Storage of receipt lots.
pub trait BatchStore: Send + Sync {
    /// Create a lot, generating a batch number when none was requested.
    fn create_batch(&self, batch: NewBatch) -> LedgerResult<Batch>;

    /// Look up a lot by id.
    fn get_batch(&self, id: &str) -> LedgerResult<Option<Batch>>;

    /// Record the FIFO layer seeded by a lot.
    fn link_fifo_layer(&self, id: &str, layer: RecordId) -> LedgerResult<()>;

    /// Remove a lot created by a commit that was rolled back.
    fn remove_batch(&self, id: &str) -> LedgerResult<()>;

    /// All lots of an item.
    fn batches_for_item(&self, material_id: &str) -> LedgerResult<Vec<Batch>>;
}

/// Storage of derived per-plant aggregates.
pub trait PlantBalanceStore: Send + Sync {
    /// Aggregate for an item in a plant.
    fn get_plant_balance(
        &self,
        material_id: &str,
        plant_id: &str,
    ) -> LedgerResult<Option<PlantStockBalance>>;

    /// Replace an aggregate.
    fn put_plant_balance(&self, balance: PlantStockBalance) -> LedgerResult<()>;

    /// All aggregates of an item.
    fn plant_balances_for_item(&self, material_id: &str) -> LedgerResult<Vec<PlantStockBalance>>;
}

/// Everything the movement processor needs from storage.
pub trait LedgerStore: BalanceStore + CostingStore + BatchStore + PlantBalanceStore {}

impl<T> LedgerStore for T where T: BalanceStore + CostingStore + BatchStore + PlantBalanceStore {}
