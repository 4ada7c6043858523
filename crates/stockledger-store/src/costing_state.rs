//! The stored costing ledger of one scope.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockledger_core::{CostingScope, FifoLayer, WeightedAverageRecord};

/// FIFO layers and weighted-average records of one [`CostingScope`],
/// written as a unit under a single version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostingState {
    /// Scope this ledger belongs to.
    pub scope: CostingScope,
    /// FIFO layers, in any order.
    #[serde(default)]
    pub layers: Vec<FifoLayer>,
    /// Weighted-average records; normally zero or one.
    #[serde(default)]
    pub averages: Vec<WeightedAverageRecord>,
    /// Incremented by the store on every successful write.
    #[serde(default)]
    pub version: u64,
}

impl CostingState {
    /// A never-written scope.
    #[must_use]
    pub fn empty(scope: CostingScope) -> Self {
        Self {
            scope,
            layers: Vec::new(),
            averages: Vec::new(),
            version: 0,
        }
    }

    /// Whether the scope holds no costing records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.averages.is_empty()
    }

    /// Highest FIFO sequence in use, 0 when there are no layers.
    #[must_use]
    pub fn max_sequence(&self) -> u32 {
        self.layers.iter().map(|l| l.fifo_sequence).max().unwrap_or(0)
    }

    /// Total unconsumed FIFO quantity.
    #[must_use]
    pub fn fifo_available(&self) -> Decimal {
        self.layers
            .iter()
            .filter(|l| !l.is_exhausted())
            .map(|l| l.fifo_available_quantity)
            .sum()
    }

    /// The most recently created weighted-average record; ties go to the
    /// higher id.
    #[must_use]
    pub fn latest_average(&self) -> Option<&WeightedAverageRecord> {
        self.averages.iter().max_by_key(|r| (r.created_at, r.id))
    }

    /// Mutable access to the latest weighted-average record.
    pub fn latest_average_mut(&mut self) -> Option<&mut WeightedAverageRecord> {
        self.averages.iter_mut().max_by_key(|r| (r.created_at, r.id))
    }
}
