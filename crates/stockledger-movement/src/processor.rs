//! Document commit with compensation.
//!
//! A commit validates the whole document, then applies each line's plan
//! through [`BalanceLedger`] and [`CostingLedger`], journaling every write.
//! If any write fails, the journal is replayed in reverse so that either
//! the whole document is applied or none of it is.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use stockledger_core::{
    round_cost, AllocationPayload, CostingMethod, CostingScope, DeltaPolicy, LedgerError,
    LedgerResult, NewBatch,
};
use stockledger_costing::CostingLedger;
use stockledger_store::{BalanceLedger, LedgerStore};
use tracing::{error, info, warn};

use crate::aggregate::rebuild_plant_aggregate;
use crate::document::{Document, LineStatus};
use crate::item::{ItemMaster, ItemProfile};
use crate::journal::{Journal, JournalEntry};
use crate::options::ProcessorOptions;
use crate::plan::{plan_line, BalanceOp, CostingOp, LinePlan};
use crate::session::{AllocationSession, ValidationReport};

/// What one committed line did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineOutcome {
    /// Line number.
    pub line_no: u32,
    /// Item.
    pub material_id: String,
    /// Net quantity applied (new minus previously committed).
    pub net_quantity: Decimal,
    /// Cost moved through the costing ledger, or the fixed-cost value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_value: Option<Decimal>,
    /// Batch the line was booked to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Why the staged allocation was ignored, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
    /// Balance primitives applied.
    pub balance_writes: usize,
}

/// Result of a committed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    /// Document committed.
    pub document_id: String,
    /// One entry per line, in line order.
    pub lines: Vec<LineOutcome>,
}

/// Applies documents to a store.
pub struct Processor<'a, S: ?Sized> {
    store: &'a S,
    items: &'a dyn ItemMaster,
    options: &'a ProcessorOptions,
}

impl<'a, S: LedgerStore + ?Sized> Processor<'a, S> {
    /// Processor over a store and an item master.
    pub fn new(store: &'a S, items: &'a dyn ItemMaster, options: &'a ProcessorOptions) -> Self {
        Self {
            store,
            items,
            options,
        }
    }

    /// Check a document without writing anything.
    pub fn validate(&self, document: &Document) -> LedgerResult<ValidationReport> {
        AllocationSession::new(self.store, self.items, document).validate()
    }

    /// Commit every line of a document, or none of them.
    ///
    /// On success each line records the allocation it was committed with
    /// in `prev_temp_qty_data`, so a later edit applies only the
    /// difference, and `Draft` lines become `Committed`.
    pub fn commit(&self, document: &mut Document) -> LedgerResult<CommitReport> {
        let plans = {
            let session = AllocationSession::new(self.store, self.items, document);
            let report = session.validate()?;
            if let Some((line_no, err)) = report.first_rejection() {
                warn!(
                    target: "stockledger::movement",
                    document = %document.document_id,
                    line = line_no,
                    code = %err.code(),
                    %err,
                    "document rejected"
                );
                return Err(err.clone());
            }
            session
                .into_plans()
                .into_iter()
                .collect::<LedgerResult<Vec<_>>>()?
        };

        let mut journal = Journal::default();
        let applied = match self.apply(document, plans, &mut journal) {
            Ok(applied) => applied,
            Err(err) => return Err(self.compensate(document, journal, err)),
        };

        let mut lines = Vec::with_capacity(applied.len());
        for (line, (plan, outcome)) in document.lines.iter_mut().zip(applied) {
            line.prev_temp_qty_data = Some(AllocationPayload::Structured(plan.effective_allocation));
            if outcome.batch_id.is_some() {
                line.batch_id.clone_from(&outcome.batch_id);
            }
            if line.status == LineStatus::Draft {
                line.status = LineStatus::Committed;
            }
            lines.push(outcome);
        }

        if self.options.refresh_aggregates {
            self.refresh(document);
        }

        Ok(CommitReport {
            document_id: document.document_id.clone(),
            lines,
        })
    }

    fn apply(
        &self,
        document: &Document,
        plans: Vec<LinePlan>,
        journal: &mut Journal,
    ) -> LedgerResult<Vec<(LinePlan, LineOutcome)>> {
        let mut applied = Vec::with_capacity(plans.len());
        for (line, mut plan) in document.lines.iter().zip(plans) {
            let profile = self.items.require(&line.material_id)?;
            let mut batch_id = line.batch_id.clone();
            let mut created = None;

            if document.document_type.is_inbound() && profile.batch_tracked && plan.needs_batch() {
                let received: Decimal = plan
                    .balance_ops
                    .iter()
                    .flat_map(BalanceOp::effects)
                    .filter(|(key, _, delta)| key.batch_id.is_none() && *delta > Decimal::ZERO)
                    .map(|(_, _, delta)| delta)
                    .sum();
                let mut request = NewBatch::new(&line.material_id, received)
                    .with_reference(&document.document_id)
                    .with_plant(document.plant_id.clone())
                    .with_organization(document.organization_id.clone());
                if let Some(number) = &line.batch_number {
                    request = request.with_batch_number(number);
                }
                let batch = self.store.create_batch(request)?;
                journal.record(JournalEntry::BatchCreated {
                    id: batch.id.clone(),
                });
                info!(
                    target: "stockledger::movement",
                    document = %document.document_id,
                    batch = %batch.id,
                    number = %batch.batch_number,
                    "created batch"
                );
                plan = plan_line(document, &line.clone().with_batch(&batch.id), &profile)?;
                batch_id = Some(batch.id.clone());
                created = Some(batch.id);
            }

            let balances = BalanceLedger::new(self.store)
                .with_max_write_attempts(self.options.max_write_attempts);
            for op in &plan.balance_ops {
                match op {
                    BalanceOp::Delta { key, bucket, delta } => {
                        balances.apply_delta(key, *bucket, *delta, document.policy)?;
                        journal.record(JournalEntry::Delta {
                            key: key.clone(),
                            bucket: *bucket,
                            delta: *delta,
                        });
                    }
                    BalanceOp::Move {
                        key,
                        from,
                        to,
                        quantity,
                    } => {
                        balances.move_bucket(key, *from, *to, *quantity)?;
                        journal.record(JournalEntry::Move {
                            key: key.clone(),
                            from: *from,
                            to: *to,
                            quantity: *quantity,
                        });
                    }
                }
            }

            let mut cost_value = None;
            for op in &plan.costing_ops {
                let value = self.apply_costing(
                    op,
                    &profile,
                    created.as_deref(),
                    document.policy,
                    journal,
                )?;
                cost_value = Some(cost_value.unwrap_or(Decimal::ZERO) + value);
            }
            if profile.costing_method == CostingMethod::FixedCost && !plan.net_quantity.is_zero() {
                cost_value = Some(round_cost(
                    plan.net_quantity.abs() * profile.fixed_cost.unwrap_or_default(),
                ));
            }

            info!(
                target: "stockledger::movement",
                document = %document.document_id,
                kind = %document.document_type,
                line = plan.line_no,
                material = %plan.material_id,
                net = %plan.net_quantity,
                cost = ?cost_value,
                "committed line"
            );
            let outcome = LineOutcome {
                line_no: plan.line_no,
                material_id: plan.material_id.clone(),
                net_quantity: plan.net_quantity,
                cost_value,
                batch_id,
                degraded: plan.degraded.clone(),
                balance_writes: plan.balance_ops.len(),
            };
            applied.push((plan, outcome));
        }
        Ok(applied)
    }

    /// Apply one costing operation; returns the cost value it moved.
    ///
    /// Under an administrative correction a consumption takes what the
    /// costing ledger holds instead of failing on a shortfall.
    fn apply_costing(
        &self,
        op: &CostingOp,
        profile: &ItemProfile,
        created_batch: Option<&str>,
        policy: DeltaPolicy,
        journal: &mut Journal,
    ) -> LedgerResult<Decimal> {
        let costing = CostingLedger::new(self.store)
            .with_max_write_attempts(self.options.max_write_attempts);
        let method = profile.costing_method;
        let consume = |scope: &CostingScope, quantity: Decimal| match policy {
            DeltaPolicy::Strict => costing.consume(method, scope, quantity),
            DeltaPolicy::AdministrativeCorrection => {
                costing.consume_correction(method, scope, quantity)
            }
        };
        match op {
            CostingOp::Receive {
                scope,
                quantity,
                unit_cost,
                batch_id,
            } => {
                let cost = match unit_cost {
                    Some(cost) => *cost,
                    None => costing.unit_cost(scope)?.unwrap_or_default(),
                };
                let receipt = costing.receive(method, scope, batch_id.as_deref(), *quantity, cost)?;
                journal.record(JournalEntry::CostReceipt {
                    scope: scope.clone(),
                    receipt: receipt.clone(),
                });
                if let (Some(created), CostingMethod::Fifo) = (created_batch, method) {
                    if batch_id.as_deref() == Some(created) {
                        self.store.link_fifo_layer(created, receipt.record_id)?;
                    }
                }
                Ok(round_cost(receipt.quantity * receipt.cost_price))
            }
            CostingOp::Consume { scope, quantity } => {
                let consumption = consume(scope, *quantity)?;
                let value = consumption.total_cost;
                journal.record(JournalEntry::CostConsumption {
                    scope: scope.clone(),
                    consumption,
                });
                Ok(value)
            }
            CostingOp::Transfer { from, to, quantity } => {
                let consumption = consume(from, *quantity)?;
                let value = consumption.total_cost;
                let unit_cost = consumption.unit_cost();
                journal.record(JournalEntry::CostConsumption {
                    scope: from.clone(),
                    consumption,
                });
                let receipt = costing.receive(method, to, None, *quantity, unit_cost)?;
                journal.record(JournalEntry::CostReceipt {
                    scope: to.clone(),
                    receipt,
                });
                Ok(value)
            }
        }
    }

    /// Undo every journaled write, newest first.
    fn compensate(&self, document: &Document, journal: Journal, original: LedgerError) -> LedgerError {
        let writes = journal.len();
        let mut failures = Vec::new();
        for entry in journal.unwind() {
            if let Err(err) = self.undo(&entry, document.policy) {
                failures.push(format!("{entry}: {err}"));
            }
        }

        if failures.is_empty() {
            warn!(
                target: "stockledger::movement",
                document = %document.document_id,
                writes,
                %original,
                "commit rolled back"
            );
            original
        } else {
            error!(
                target: "stockledger::movement",
                document = %document.document_id,
                writes,
                failed = failures.len(),
                %original,
                "compensation failed, manual reconciliation required"
            );
            LedgerError::CompensationFailed {
                original: Box::new(original),
                failures,
            }
        }
    }

    fn undo(&self, entry: &JournalEntry, policy: DeltaPolicy) -> LedgerResult<()> {
        let balances =
            BalanceLedger::new(self.store).with_max_write_attempts(self.options.max_write_attempts);
        let costing =
            CostingLedger::new(self.store).with_max_write_attempts(self.options.max_write_attempts);
        match entry {
            JournalEntry::Delta { key, bucket, delta } => {
                balances.apply_delta(key, *bucket, -*delta, policy)?;
            }
            JournalEntry::Move {
                key,
                from,
                to,
                quantity,
            } => {
                balances.move_bucket(key, *to, *from, *quantity)?;
            }
            JournalEntry::CostReceipt { scope, receipt } => costing.undo_receipt(scope, receipt)?,
            JournalEntry::CostConsumption { scope, consumption } => {
                costing.undo_consumption(scope, consumption)?;
            }
            JournalEntry::BatchCreated { id } => self.store.remove_batch(id)?,
        }
        Ok(())
    }

    fn refresh(&self, document: &Document) {
        let materials: BTreeSet<&str> = document
            .lines
            .iter()
            .map(|line| line.material_id.as_str())
            .collect();
        for material in materials {
            if let Err(err) =
                rebuild_plant_aggregate(self.store, material, &self.options.default_plant)
            {
                warn!(
                    target: "stockledger::aggregate",
                    material,
                    %err,
                    "plant aggregate refresh failed"
                );
            }
        }
    }
}
