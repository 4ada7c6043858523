//! Costing records: FIFO layers and weighted-average records.
//!
//! Which representation applies to an item is decided by its
//! [`CostingMethod`], owned by the item master. An item is never costed by
//! both representations at once.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LedgerError;

/// Store-assigned identifier of a costing record.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an item's stock is valued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostingMethod {
    /// First in, first out: cost layers consumed in sequence order.
    Fifo,
    /// Moving weighted average.
    WeightedAverage,
    /// A fixed price from the item master; no costing ledger.
    FixedCost,
}

impl CostingMethod {
    /// Whether stock movements of this method touch the costing ledger.
    #[must_use]
    pub const fn uses_ledger(self) -> bool {
        !matches!(self, Self::FixedCost)
    }
}

impl FromStr for CostingMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == '-' { ' ' } else { c.to_ascii_lowercase() })
            .collect();
        match normalized.as_str() {
            "fifo" | "first in first out" => Ok(Self::Fifo),
            "wa" | "weighted average" | "average" | "moving average" => {
                Ok(Self::WeightedAverage)
            }
            "fixed" | "fixed cost" => Ok(Self::FixedCost),
            _ => Err(LedgerError::InvalidCostingMethod(s.to_string())),
        }
    }
}

impl fmt::Display for CostingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "First In First Out"),
            Self::WeightedAverage => write!(f, "Weighted Average"),
            Self::FixedCost => write!(f, "Fixed Cost"),
        }
    }
}

/// The unit a costing ledger is kept for: an item, optionally per plant
/// and organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CostingScope {
    /// Item.
    pub material_id: String,
    /// Plant, when costing is plant-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    /// Organization, when costing is organization-scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

impl CostingScope {
    /// Item-wide scope.
    #[must_use]
    pub fn item(material_id: impl Into<String>) -> Self {
        Self {
            material_id: material_id.into(),
            plant_id: None,
            organization_id: None,
        }
    }

    /// Narrow to a plant.
    #[must_use]
    pub fn with_plant(mut self, plant_id: impl Into<String>) -> Self {
        self.plant_id = Some(plant_id.into());
        self
    }

    /// Narrow to an organization.
    #[must_use]
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }
}

impl fmt::Display for CostingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.material_id)?;
        if let Some(plant) = &self.plant_id {
            write!(f, " [{plant}]")?;
        }
        if let Some(org) = &self.organization_id {
            write!(f, " <{org}>")?;
        }
        Ok(())
    }
}

/// One FIFO cost layer (`fifo_costing_history` row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FifoLayer {
    /// Store-assigned id.
    pub id: RecordId,
    /// Item.
    pub material_id: String,
    /// Batch the layer was received with, if batch-tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Plant, for plant-scoped costing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    /// Consumption order; strictly increasing per item.
    pub fifo_sequence: u32,
    /// Unit cost of this layer.
    pub fifo_cost_price: Decimal,
    /// Quantity the layer was created with.
    pub fifo_initial_quantity: Decimal,
    /// Quantity not yet consumed.
    pub fifo_available_quantity: Decimal,
    /// Creation time.
    pub created_at: NaiveDateTime,
}

impl FifoLayer {
    /// Whether nothing is left to consume.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.fifo_available_quantity <= Decimal::ZERO
    }

    /// Value of the remaining quantity.
    #[must_use]
    pub fn available_value(&self) -> Decimal {
        self.fifo_available_quantity * self.fifo_cost_price
    }
}

/// The weighted-average record of an item (optionally per plant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedAverageRecord {
    /// Store-assigned id.
    pub id: RecordId,
    /// Item.
    pub material_id: String,
    /// Plant, for plant-scoped costing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    /// Units valued at `wa_cost_price`.
    pub wa_quantity: Decimal,
    /// Moving-average unit cost; never negative.
    pub wa_cost_price: Decimal,
    /// Creation time; the newest record wins when several exist.
    pub created_at: NaiveDateTime,
}

impl WeightedAverageRecord {
    /// Value of the record's quantity.
    #[must_use]
    pub fn value(&self) -> Decimal {
        self.wa_quantity * self.wa_cost_price
    }
}
