//! Costing ledger facade over a [`CostingStore`].

use chrono::Utc;
use rust_decimal::Decimal;
use stockledger_core::{
    round_cost, round_qty, CostingMethod, CostingScope, LedgerError, LedgerResult,
};
use stockledger_store::{
    retry_on_conflict, CostingState, CostingStore, DEFAULT_MAX_WRITE_ATTEMPTS,
};
use tracing::{debug, info, warn};

use crate::migrate::{apply_plan, plan_migration, MigrationPlan};
use crate::{average, fifo, Consumption, PriorAverage, Receipt};

/// FIFO and weighted-average operations with persistence and optimistic retry.
///
/// Every operation loads the scope's [`CostingState`], changes a copy and
/// writes it back with the version it read; a lost race is retried.
pub struct CostingLedger<'a, S: ?Sized> {
    store: &'a S,
    max_write_attempts: u32,
}

impl<'a, S: CostingStore + ?Sized> CostingLedger<'a, S> {
    /// Ledger over a store with the default retry budget.
    pub const fn new(store: &'a S) -> Self {
        Self {
            store,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    /// Set how many version races a write may lose before giving up.
    #[must_use]
    pub const fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts;
        self
    }

    /// Current costing state of a scope.
    pub fn state(&self, scope: &CostingScope) -> LedgerResult<CostingState> {
        self.store.load_costing(scope)
    }

    /// Record a receipt: a new FIFO layer or a weighted-average blend.
    pub fn receive(
        &self,
        method: CostingMethod,
        scope: &CostingScope,
        batch_id: Option<&str>,
        quantity: Decimal,
        cost_price: Decimal,
    ) -> LedgerResult<Receipt> {
        let receipt = self.update(scope, "costing receipt", |state| {
            let now = Utc::now().naive_utc();
            match method {
                CostingMethod::Fifo => {
                    let layer = fifo::add_layer(
                        state,
                        self.store.next_record_id(),
                        batch_id.map(str::to_string),
                        cost_price,
                        quantity,
                        now,
                    )?;
                    Ok(Receipt {
                        method,
                        record_id: layer.id,
                        quantity: layer.fifo_initial_quantity,
                        cost_price: layer.fifo_cost_price,
                        prior_average: None,
                    })
                }
                CostingMethod::WeightedAverage => {
                    let prior_average = state.latest_average().map(PriorAverage::of);
                    let record = average::receive(
                        state,
                        quantity,
                        cost_price,
                        || self.store.next_record_id(),
                        now,
                    )?;
                    Ok(Receipt {
                        method,
                        record_id: record.id,
                        quantity: round_qty(quantity),
                        cost_price: round_cost(cost_price),
                        prior_average,
                    })
                }
                CostingMethod::FixedCost => Err(no_ledger(scope)),
            }
        })?;
        debug!(
            target: "stockledger::costing",
            scope = %scope,
            method = %method,
            quantity = %receipt.quantity,
            cost = %receipt.cost_price,
            "costing receipt"
        );
        Ok(receipt)
    }

    /// Consume quantity and report the cost realised.
    pub fn consume(
        &self,
        method: CostingMethod,
        scope: &CostingScope,
        quantity: Decimal,
    ) -> LedgerResult<Consumption> {
        let used = self.update(scope, "costing consumption", |state| match method {
            CostingMethod::Fifo => fifo::consume(state, quantity),
            CostingMethod::WeightedAverage => average::consume(state, quantity),
            CostingMethod::FixedCost => Err(no_ledger(scope)),
        })?;
        debug!(
            target: "stockledger::costing",
            scope = %scope,
            method = %method,
            quantity = %used.quantity,
            cost = %used.total_cost,
            "costing consumption"
        );
        Ok(used)
    }

    /// Consume for an administrative correction.
    ///
    /// Takes what the ledger holds, up to `quantity`, instead of failing on a
    /// shortfall; see [`fifo::consume_available`] and
    /// [`average::consume_available`] for how the shortfall is costed.
    pub fn consume_correction(
        &self,
        method: CostingMethod,
        scope: &CostingScope,
        quantity: Decimal,
    ) -> LedgerResult<Consumption> {
        let used = self.update(scope, "costing correction", |state| match method {
            CostingMethod::Fifo => fifo::consume_available(state, quantity),
            CostingMethod::WeightedAverage => average::consume_available(state, quantity),
            CostingMethod::FixedCost => Err(no_ledger(scope)),
        })?;
        if !used.uncovered.is_zero() {
            warn!(
                target: "stockledger::costing",
                scope = %scope,
                method = %method,
                quantity = %used.quantity,
                uncovered = %used.uncovered,
                "correction consumed more than the costing ledger holds"
            );
        }
        Ok(used)
    }

    /// Reverse a receipt recorded by [`receive`](Self::receive).
    pub fn undo_receipt(&self, scope: &CostingScope, receipt: &Receipt) -> LedgerResult<()> {
        self.update(scope, "costing receipt reversal", |state| match receipt.method {
            CostingMethod::Fifo => fifo::retract_layer(state, receipt.record_id),
            CostingMethod::WeightedAverage => average::reverse_receipt(state, receipt),
            CostingMethod::FixedCost => Ok(()),
        })
    }

    /// Reverse a consumption recorded by [`consume`](Self::consume).
    pub fn undo_consumption(
        &self,
        scope: &CostingScope,
        consumption: &Consumption,
    ) -> LedgerResult<()> {
        self.update(scope, "costing consumption reversal", |state| {
            match consumption.method {
                CostingMethod::Fifo => fifo::restore(state, &consumption.draws),
                CostingMethod::WeightedAverage => average::restore(state, consumption.drawn()),
                CostingMethod::FixedCost => Ok(()),
            }
        })
    }

    /// Current unit cost: the weighted-average cost when a record exists,
    /// otherwise the cost of the oldest FIFO layer with quantity left.
    pub fn unit_cost(&self, scope: &CostingScope) -> LedgerResult<Option<Decimal>> {
        let state = self.state(scope)?;
        Ok(average::current_cost(&state).or_else(|| fifo::current_cost(&state)))
    }

    /// Plan a migration without changing anything.
    pub fn preview_migration(
        &self,
        scope: &CostingScope,
        target: CostingMethod,
    ) -> LedgerResult<MigrationPlan> {
        plan_migration(target, &self.state(scope)?)
    }

    /// Convert a scope to another costing method and return the plan applied.
    pub fn migrate(
        &self,
        scope: &CostingScope,
        target: CostingMethod,
    ) -> LedgerResult<MigrationPlan> {
        let plan = self.update(scope, "costing migration", |state| {
            let plan = plan_migration(target, state)?;
            apply_plan(state, &plan, self.store.next_record_id(), Utc::now().naive_utc())?;
            Ok(plan)
        })?;
        info!(
            target: "stockledger::costing",
            scope = %scope,
            target_method = %target,
            quantity = %plan.quantity(),
            deleted = plan.ids_to_delete.len(),
            "migrated costing method"
        );
        Ok(plan)
    }

    fn update<T>(
        &self,
        scope: &CostingScope,
        what: &str,
        mut change: impl FnMut(&mut CostingState) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        retry_on_conflict(what, self.max_write_attempts, || {
            let mut state = self.store.load_costing(scope)?;
            let out = change(&mut state)?;
            self.store.store_costing(state)?;
            Ok(out)
        })
    }
}

fn no_ledger(scope: &CostingScope) -> LedgerError {
    LedgerError::InvalidCostingMethod(format!(
        "{} has no costing ledger ({scope})",
        CostingMethod::FixedCost
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockledger_store::MemoryStore;

    #[test]
    fn test_receipt_and_consumption_persist() {
        let store = MemoryStore::new();
        let ledger = CostingLedger::new(&store);
        let scope = CostingScope::item("M1");
        ledger
            .receive(CostingMethod::Fifo, &scope, Some("B1"), dec!(100), dec!(10))
            .unwrap();
        ledger
            .consume(CostingMethod::Fifo, &scope, dec!(60))
            .unwrap();

        let state = ledger.state(&scope).unwrap();
        assert_eq!(state.layers.len(), 1);
        assert_eq!(state.layers[0].fifo_available_quantity, dec!(40));
        assert_eq!(state.layers[0].batch_id.as_deref(), Some("B1"));
        assert_eq!(state.version, 2);
    }

    #[test]
    fn test_undo_receipt() {
        let store = MemoryStore::new();
        let ledger = CostingLedger::new(&store);
        let scope = CostingScope::item("M1").with_plant("P1");
        let first = ledger
            .receive(CostingMethod::WeightedAverage, &scope, None, dec!(10), dec!(4))
            .unwrap();
        let second = ledger
            .receive(CostingMethod::WeightedAverage, &scope, None, dec!(30), dec!(8))
            .unwrap();
        assert_eq!(first.record_id, second.record_id);
        assert_eq!(ledger.unit_cost(&scope).unwrap(), Some(dec!(7)));

        ledger.undo_receipt(&scope, &second).unwrap();
        assert_eq!(ledger.unit_cost(&scope).unwrap(), Some(dec!(4)));
    }

    #[test]
    fn test_undo_receipt_restores_rounded_average() {
        let store = MemoryStore::new();
        let ledger = CostingLedger::new(&store);
        let scope = CostingScope::item("M1");
        ledger
            .receive(CostingMethod::WeightedAverage, &scope, None, dec!(1), dec!(1))
            .unwrap();
        let second = ledger
            .receive(CostingMethod::WeightedAverage, &scope, None, dec!(2), dec!(2))
            .unwrap();
        assert_eq!(ledger.unit_cost(&scope).unwrap(), Some(dec!(1.6667)));

        ledger.undo_receipt(&scope, &second).unwrap();
        let record = ledger.state(&scope).unwrap().latest_average().cloned().unwrap();
        assert_eq!(record.wa_quantity, dec!(1));
        assert_eq!(record.wa_cost_price, dec!(1));
    }

    #[test]
    fn test_undo_consumption() {
        let store = MemoryStore::new();
        let ledger = CostingLedger::new(&store);
        let scope = CostingScope::item("M1");
        ledger
            .receive(CostingMethod::Fifo, &scope, None, dec!(5), dec!(1))
            .unwrap();
        ledger
            .receive(CostingMethod::Fifo, &scope, None, dec!(5), dec!(2))
            .unwrap();
        let used = ledger.consume(CostingMethod::Fifo, &scope, dec!(7)).unwrap();
        assert_eq!(used.total_cost, dec!(9));
        assert_eq!(used.unit_cost(), dec!(1.2857));

        ledger.undo_consumption(&scope, &used).unwrap();
        assert_eq!(ledger.state(&scope).unwrap().fifo_available(), dec!(10));
    }

    #[test]
    fn test_fixed_cost_has_no_ledger() {
        let store = MemoryStore::new();
        let ledger = CostingLedger::new(&store);
        let scope = CostingScope::item("M1");
        let err = ledger
            .receive(CostingMethod::FixedCost, &scope, None, dec!(1), dec!(1))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidCostingMethod(_)));
        assert!(ledger.state(&scope).unwrap().is_empty());
    }

    #[test]
    fn test_failed_consumption_writes_nothing() {
        let store = MemoryStore::new();
        let ledger = CostingLedger::new(&store);
        let scope = CostingScope::item("M1");
        ledger
            .receive(CostingMethod::Fifo, &scope, None, dec!(5), dec!(1))
            .unwrap();
        let before = ledger.state(&scope).unwrap();
        assert!(ledger.consume(CostingMethod::Fifo, &scope, dec!(6)).is_err());
        assert_eq!(ledger.state(&scope).unwrap(), before);
    }
}
