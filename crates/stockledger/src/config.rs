//! Ledger configuration file.
//!
//! ```json
//! {
//!   "state_file": "stockledger-state.json",
//!   "default_plant": "__default__",
//!   "max_write_attempts": 8,
//!   "refresh_aggregates": true,
//!   "items": [
//!     { "material_id": "M-100", "costing_method": "FIFO" },
//!     { "material_id": "M-200", "costing_method": "Weighted Average", "batch_tracked": true },
//!     { "material_id": "M-300", "costing_method": "Fixed Cost", "fixed_cost": "2.50" }
//!   ]
//! }
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stockledger_core::{CostingMethod, LedgerError};
use stockledger_movement::{ItemProfile, ProcessorOptions, StaticItemMaster};
use thiserror::Error;

/// Errors reading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error on the configuration file.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// The config path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for a configuration.
    #[error("invalid config {path}: {source}")]
    Format {
        /// The config path.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// An item entry is unusable.
    #[error("item {material_id}: {source}")]
    Item {
        /// Item whose entry is wrong.
        material_id: String,
        /// What is wrong with it.
        #[source]
        source: LedgerError,
    },
}

/// One item master entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemEntry {
    /// Item.
    pub material_id: String,
    /// Costing method name (`"FIFO"`, `"Weighted Average"`, `"Fixed Cost"`).
    pub costing_method: String,
    /// Whether balances are kept per batch.
    #[serde(default)]
    pub batch_tracked: bool,
    /// Whether balances are kept per serial number.
    #[serde(default)]
    pub serial_tracked: bool,
    /// Unit cost of a fixed-cost item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_cost: Option<Decimal>,
}

impl ItemEntry {
    /// Resolve the entry into a profile.
    pub fn profile(&self) -> Result<ItemProfile, LedgerError> {
        let method: CostingMethod = self.costing_method.parse()?;
        if method == CostingMethod::FixedCost && self.fixed_cost.is_none() {
            return Err(LedgerError::MissingConfiguration(format!(
                "fixed cost of {}",
                self.material_id
            )));
        }
        let mut profile = ItemProfile::new(&self.material_id, method);
        profile.batch_tracked = self.batch_tracked;
        profile.serial_tracked = self.serial_tracked;
        profile.fixed_cost = self.fixed_cost;
        Ok(profile)
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Snapshot the ledger state is kept in.
    pub state_file: PathBuf,
    /// Processor tunables.
    #[serde(flatten)]
    pub processor: ProcessorOptions,
    /// Item master.
    pub items: Vec<ItemEntry>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("stockledger-state.json"),
            processor: ProcessorOptions::default(),
            items: Vec::new(),
        }
    }
}

impl LedgerConfig {
    /// Read a configuration file; a missing file is the default configuration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build the item master, rejecting unusable entries.
    pub fn item_master(&self) -> Result<StaticItemMaster, ConfigError> {
        self.items
            .iter()
            .map(|entry| {
                entry.profile().map_err(|source| ConfigError::Item {
                    material_id: entry.material_id.clone(),
                    source,
                })
            })
            .collect()
    }
}
