//! Processor options.

use serde::{Deserialize, Serialize};
use stockledger_store::DEFAULT_MAX_WRITE_ATTEMPTS;

/// Plant id given to balance rows that carry none.
pub const DEFAULT_PLANT: &str = "__default__";

/// Tunables of the movement processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
    /// Version races a single write may lose before the commit fails.
    pub max_write_attempts: u32,
    /// Aggregation bucket for rows without a plant.
    pub default_plant: String,
    /// Rebuild plant aggregates of the touched items after each commit.
    pub refresh_aggregates: bool,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
            default_plant: DEFAULT_PLANT.to_string(),
            refresh_aggregates: false,
        }
    }
}

impl ProcessorOptions {
    /// Set the retry budget.
    #[must_use]
    pub const fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts;
        self
    }

    /// Set the default plant.
    #[must_use]
    pub fn with_default_plant(mut self, plant: impl Into<String>) -> Self {
        self.default_plant = plant.into();
        self
    }

    /// Rebuild aggregates after commits.
    #[must_use]
    pub const fn with_refresh_aggregates(mut self, refresh: bool) -> Self {
        self.refresh_aggregates = refresh;
        self
    }
}
