//! JSON snapshots of a [`MemoryStore`](crate::MemoryStore).
//!
//! A snapshot is a plain JSON document with one array per table. Writes go
//! to a sibling temporary file that is renamed over the target, so a crash
//! mid-write leaves the previous snapshot intact.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stockledger_core::{BalanceRecord, Batch, PlantStockBalance};
use thiserror::Error;
use tracing::debug;

use crate::{CostingState, MemoryStore};

/// Errors reading or writing a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// IO error on the snapshot file.
    #[error("failed to access snapshot {path}: {source}")]
    Io {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not a valid snapshot.
    #[error("invalid snapshot {path}: {source}")]
    Format {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Serializable contents of every ledger table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// `item_balance`, `item_batch_balance` and `item_serial_balance` rows.
    #[serde(default)]
    pub balances: Vec<BalanceRecord>,
    /// `plant_stock_balance` rows.
    #[serde(default)]
    pub plant_balances: Vec<PlantStockBalance>,
    /// Costing ledgers per scope.
    #[serde(default)]
    pub costing: Vec<CostingState>,
    /// Receipt lots.
    #[serde(default)]
    pub batches: Vec<Batch>,
    /// Last issued costing record id.
    #[serde(default)]
    pub next_record_id: u64,
    /// Last issued batch sequence.
    #[serde(default)]
    pub batch_seq: u64,
}

/// Load a store from a snapshot file; a missing file is an empty store.
pub fn load(path: &Path) -> Result<MemoryStore, SnapshotError> {
    if !path.exists() {
        debug!(target: "stockledger::store", path = %path.display(), "no snapshot, starting empty");
        return Ok(MemoryStore::new());
    }
    let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: Snapshot = serde_json::from_str(&text).map_err(|source| SnapshotError::Format {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        target: "stockledger::store",
        path = %path.display(),
        balances = snapshot.balances.len(),
        "loaded snapshot"
    );
    Ok(MemoryStore::from_snapshot(snapshot))
}

/// Write a store to a snapshot file.
pub fn save(store: &MemoryStore, path: &Path) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    let text = serde_json::to_string_pretty(&store.snapshot()).map_err(|source| {
        SnapshotError::Format {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, text).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
