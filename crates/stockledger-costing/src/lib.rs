//! Costing ledger for stockledger.
//!
//! This crate provides:
//! - FIFO layer operations ([`fifo`])
//! - Moving weighted-average operations ([`average`])
//! - The [`CostingLedger`] facade that loads, changes and writes a scope's
//!   costing state with optimistic retry
//! - Costing-method migration ([`plan_migration`] / [`apply_plan`])
//!
//! # Example
//!
//! ```
//! use stockledger_core::{CostingMethod, CostingScope};
//! use stockledger_costing::CostingLedger;
//! use stockledger_store::MemoryStore;
//! use rust_decimal_macros::dec;
//!
//! let store = MemoryStore::new();
//! let ledger = CostingLedger::new(&store);
//! let scope = CostingScope::item("M-100");
//!
//! ledger.receive(CostingMethod::Fifo, &scope, None, dec!(100), dec!(10)).unwrap();
//! let used = ledger.consume(CostingMethod::Fifo, &scope, dec!(60)).unwrap();
//! assert_eq!(used.total_cost, dec!(600));
//!
//! let plan = ledger.migrate(&scope, CostingMethod::WeightedAverage).unwrap();
//! assert_eq!(plan.quantity(), dec!(40));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod average;
pub mod fifo;
mod ledger;
mod migrate;

pub use fifo::LayerDraw;
pub use ledger::CostingLedger;
pub use migrate::{apply_plan, parse_target, plan_migration, MigrationAction, MigrationPlan};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockledger_core::{round_cost, CostingMethod, RecordId, WeightedAverageRecord};

/// Cost realised by taking stock out of a costing ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumption {
    /// Method the quantity was costed with.
    pub method: CostingMethod,
    /// Quantity consumed.
    pub quantity: Decimal,
    /// Part of `quantity` the ledger did not hold; costed but not drawn.
    #[serde(default, skip_serializing_if = "Decimal::is_zero")]
    pub uncovered: Decimal,
    /// Total cost of the quantity.
    pub total_cost: Decimal,
    /// Per-layer breakdown (FIFO only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub draws: Vec<LayerDraw>,
}

impl Consumption {
    /// Quantity actually taken out of layers or the average record.
    #[must_use]
    pub fn drawn(&self) -> Decimal {
        self.quantity - self.uncovered
    }

    /// Average unit cost of the consumed quantity.
    #[must_use]
    pub fn unit_cost(&self) -> Decimal {
        if self.quantity.is_zero() {
            Decimal::ZERO
        } else {
            round_cost(self.total_cost / self.quantity)
        }
    }
}

/// What a receipt added to a costing ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Method the quantity was costed with.
    pub method: CostingMethod,
    /// FIFO layer or weighted-average record written.
    pub record_id: RecordId,
    /// Quantity received.
    pub quantity: Decimal,
    /// Unit cost received at.
    pub cost_price: Decimal,
    /// Weighted-average record as it was before the receipt blended into it;
    /// absent for FIFO receipts and for receipts that created the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_average: Option<PriorAverage>,
}

/// Quantity and cost of a weighted-average record at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorAverage {
    /// Quantity held.
    pub wa_quantity: Decimal,
    /// Unit cost.
    pub wa_cost_price: Decimal,
}

impl PriorAverage {
    /// Capture a record.
    #[must_use]
    pub const fn of(record: &WeightedAverageRecord) -> Self {
        Self {
            wa_quantity: record.wa_quantity,
            wa_cost_price: record.wa_cost_price,
        }
    }
}
