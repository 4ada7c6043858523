//! Costing-method migration.
//!
//! [`plan_migration`] is a pure function from an item's current costing
//! state to a [`MigrationPlan`] of add/update/delete instructions;
//! [`apply_plan`] carries the plan out on a state. Keeping the two apart
//! lets a plan be inspected (or shown to a user) before anything changes.
//!
//! Quantities are rounded to 3 places and costs to 4 before any arithmetic.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockledger_core::{
    round_cost, round_qty, CostingMethod, CostingScope, FifoLayer, LedgerError, LedgerResult,
    RecordId, WeightedAverageRecord,
};
use stockledger_store::CostingState;

use crate::average::blend;

/// What a migration writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MigrationAction {
    /// Create a weighted-average record.
    AddAverage {
        /// Quantity carried over.
        wa_quantity: Decimal,
        /// Blended cost.
        wa_cost_price: Decimal,
    },
    /// Overwrite an existing weighted-average record.
    UpdateAverage {
        /// Record being updated.
        id: RecordId,
        /// New quantity.
        wa_quantity: Decimal,
        /// New cost.
        wa_cost_price: Decimal,
    },
    /// Append a fresh FIFO layer.
    AddLayer {
        /// Sequence of the new layer.
        fifo_sequence: u32,
        /// Cost of the new layer.
        fifo_cost_price: Decimal,
        /// Quantity of the new layer.
        fifo_quantity: Decimal,
    },
}

/// Instructions converting one scope to a target costing method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    /// Scope being migrated.
    pub scope: CostingScope,
    /// Target method.
    pub target: CostingMethod,
    /// The record to add or update.
    pub action: MigrationAction,
    /// Every prior record of the source representation.
    pub ids_to_delete: Vec<RecordId>,
}

impl MigrationPlan {
    /// Quantity the target representation ends up holding from this plan.
    #[must_use]
    pub const fn quantity(&self) -> Decimal {
        match &self.action {
            MigrationAction::AddAverage { wa_quantity, .. }
            | MigrationAction::UpdateAverage { wa_quantity, .. } => *wa_quantity,
            MigrationAction::AddLayer { fifo_quantity, .. } => *fifo_quantity,
        }
    }
}

/// Parse a migration target; only FIFO and weighted average qualify.
pub fn parse_target(target: &str) -> LedgerResult<CostingMethod> {
    match target.parse::<CostingMethod>()? {
        CostingMethod::FixedCost => Err(LedgerError::InvalidCostingMethod(target.to_string())),
        method => Ok(method),
    }
}

/// Plan the conversion of `state` to `target`.
///
/// To weighted average, the open FIFO layers are summed and either become a
/// new record or are blended into the latest existing one; every layer id is
/// scheduled for deletion. To FIFO, the latest weighted-average record
/// becomes a new layer after any existing ones; every weighted-average id
/// is scheduled for deletion.
pub fn plan_migration(target: CostingMethod, state: &CostingState) -> LedgerResult<MigrationPlan> {
    match target {
        CostingMethod::WeightedAverage => plan_to_average(state),
        CostingMethod::Fifo => plan_to_fifo(state),
        CostingMethod::FixedCost => Err(LedgerError::InvalidCostingMethod(target.to_string())),
    }
}

fn plan_to_average(state: &CostingState) -> LedgerResult<MigrationPlan> {
    let (fifo_quantity, fifo_value) = state
        .layers
        .iter()
        .filter(|l| l.fifo_available_quantity > Decimal::ZERO)
        .fold((Decimal::ZERO, Decimal::ZERO), |(qty, value), l| {
            let q = round_qty(l.fifo_available_quantity);
            (qty + q, value + q * round_cost(l.fifo_cost_price))
        });

    let mut ids_to_delete: Vec<RecordId> = state.layers.iter().map(|l| l.id).collect();

    let action = if let Some(existing) = state.latest_average() {
        let old_qty = round_qty(existing.wa_quantity);
        let old_cost = round_cost(existing.wa_cost_price);
        let fifo_cost = if fifo_quantity > Decimal::ZERO {
            fifo_value / fifo_quantity
        } else {
            Decimal::ZERO
        };
        ids_to_delete.extend(
            state
                .averages
                .iter()
                .filter(|r| r.id != existing.id)
                .map(|r| r.id),
        );
        MigrationAction::UpdateAverage {
            id: existing.id,
            wa_quantity: round_qty(old_qty + fifo_quantity),
            wa_cost_price: blend(old_qty, old_cost, fifo_quantity, fifo_cost),
        }
    } else {
        if fifo_quantity <= Decimal::ZERO {
            return Err(LedgerError::NothingToMigrate {
                material_id: state.scope.material_id.clone(),
                reason: "no FIFO quantity available".to_string(),
            });
        }
        MigrationAction::AddAverage {
            wa_quantity: round_qty(fifo_quantity),
            wa_cost_price: round_cost(fifo_value / fifo_quantity),
        }
    };

    Ok(MigrationPlan {
        scope: state.scope.clone(),
        target: CostingMethod::WeightedAverage,
        action,
        ids_to_delete,
    })
}

fn plan_to_fifo(state: &CostingState) -> LedgerResult<MigrationPlan> {
    let source = state
        .latest_average()
        .filter(|r| round_qty(r.wa_quantity) > Decimal::ZERO)
        .ok_or_else(|| LedgerError::NothingToMigrate {
            material_id: state.scope.material_id.clone(),
            reason: "weighted-average quantity is zero or absent".to_string(),
        })?;

    Ok(MigrationPlan {
        scope: state.scope.clone(),
        target: CostingMethod::Fifo,
        action: MigrationAction::AddLayer {
            fifo_sequence: state.max_sequence() + 1,
            fifo_cost_price: round_cost(source.wa_cost_price),
            fifo_quantity: round_qty(source.wa_quantity),
        },
        ids_to_delete: state.averages.iter().map(|r| r.id).collect(),
    })
}

/// Carry out a plan on a state.
///
/// `new_id` is used for the record an `Add*` action creates.
pub fn apply_plan(
    state: &mut CostingState,
    plan: &MigrationPlan,
    new_id: RecordId,
    created_at: NaiveDateTime,
) -> LedgerResult<()> {
    if let MigrationAction::UpdateAverage { id, .. } = &plan.action {
        if !state.averages.iter().any(|r| r.id == *id) {
            return Err(LedgerError::MissingConfiguration(format!(
                "weighted average record {id}"
            )));
        }
    }

    state.layers.retain(|l| !plan.ids_to_delete.contains(&l.id));
    state.averages.retain(|r| !plan.ids_to_delete.contains(&r.id));

    match &plan.action {
        MigrationAction::AddAverage {
            wa_quantity,
            wa_cost_price,
        } => state.averages.push(WeightedAverageRecord {
            id: new_id,
            material_id: state.scope.material_id.clone(),
            plant_id: state.scope.plant_id.clone(),
            wa_quantity: *wa_quantity,
            wa_cost_price: *wa_cost_price,
            created_at,
        }),
        MigrationAction::UpdateAverage {
            id,
            wa_quantity,
            wa_cost_price,
        } => {
            if let Some(record) = state.averages.iter_mut().find(|r| r.id == *id) {
                record.wa_quantity = *wa_quantity;
                record.wa_cost_price = *wa_cost_price;
            }
        }
        MigrationAction::AddLayer {
            fifo_sequence,
            fifo_cost_price,
            fifo_quantity,
        } => state.layers.push(FifoLayer {
            id: new_id,
            material_id: state.scope.material_id.clone(),
            batch_id: None,
            plant_id: state.scope.plant_id.clone(),
            fifo_sequence: *fifo_sequence,
            fifo_cost_price: *fifo_cost_price,
            fifo_initial_quantity: *fifo_quantity,
            fifo_available_quantity: *fifo_quantity,
            created_at,
        }),
    }
    Ok(())
}
