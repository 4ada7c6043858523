//! The ledger facade.

use rayon::prelude::*;
use rust_decimal::Decimal;
use stockledger_core::{
    BalanceKey, BalanceRecord, Bucket, CostingScope, LedgerResult, PlantStockBalance,
};
use stockledger_costing::{parse_target, CostingLedger, MigrationPlan};
use stockledger_store::{BalanceLedger, LedgerStore};

use crate::aggregate;
use crate::document::{Document, DocumentLine, DocumentType, MovementKind};
use crate::item::{ItemMaster, StaticItemMaster};
use crate::options::ProcessorOptions;
use crate::processor::{CommitReport, Processor};
use crate::session::ValidationReport;

/// Reference used for single-line requests that carry none.
const ADHOC_REFERENCE: &str = "adhoc";

/// A single receipt into one balance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptRequest {
    /// Row receiving the stock.
    pub key: BalanceKey,
    /// Quantity received.
    pub quantity: Decimal,
    /// Unit cost; required for FIFO and weighted-average items.
    pub unit_cost: Option<Decimal>,
    /// Bucket credited.
    pub bucket: Bucket,
    /// Batch number for a batch created by the receipt.
    pub batch_number: Option<String>,
    /// Receiving reference.
    pub reference: String,
}

impl ReceiptRequest {
    /// Receive `quantity` into the unrestricted bucket of `key`.
    #[must_use]
    pub fn new(key: BalanceKey, quantity: Decimal) -> Self {
        Self {
            key,
            quantity,
            unit_cost: None,
            bucket: Bucket::Unrestricted,
            batch_number: None,
            reference: ADHOC_REFERENCE.to_string(),
        }
    }

    /// Set the unit cost.
    #[must_use]
    pub fn with_unit_cost(mut self, cost: Decimal) -> Self {
        self.unit_cost = Some(cost);
        self
    }

    /// Credit another bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = bucket;
        self
    }

    /// Batch number for a newly created batch.
    #[must_use]
    pub fn with_batch_number(mut self, number: impl Into<String>) -> Self {
        self.batch_number = Some(number.into());
        self
    }

    /// Set the receiving reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }
}

/// A single consumption from one balance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRequest {
    /// Row consumed from.
    pub key: BalanceKey,
    /// Quantity consumed.
    pub quantity: Decimal,
    /// Bucket debited.
    pub bucket: Bucket,
    /// Issue reference.
    pub reference: String,
}

impl ConsumptionRequest {
    /// Consume `quantity` from the unrestricted bucket of `key`.
    #[must_use]
    pub fn new(key: BalanceKey, quantity: Decimal) -> Self {
        Self {
            key,
            quantity,
            bucket: Bucket::Unrestricted,
            reference: ADHOC_REFERENCE.to_string(),
        }
    }

    /// Debit another bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = bucket;
        self
    }

    /// Set the issue reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }
}

/// A bucket (and optionally location) transfer on one balance row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Source row.
    pub key: BalanceKey,
    /// Source bucket.
    pub from: Bucket,
    /// Destination bucket.
    pub to: Bucket,
    /// Quantity moved.
    pub quantity: Decimal,
    /// Destination location; the source location when absent.
    pub target_location: Option<String>,
    /// Movement reference.
    pub reference: String,
}

impl TransferRequest {
    /// Move `quantity` between two buckets of `key`.
    #[must_use]
    pub fn new(key: BalanceKey, from: Bucket, to: Bucket, quantity: Decimal) -> Self {
        Self {
            key,
            from,
            to,
            quantity,
            target_location: None,
            reference: ADHOC_REFERENCE.to_string(),
        }
    }

    /// Land the stock at another location.
    #[must_use]
    pub fn with_target_location(mut self, location_id: impl Into<String>) -> Self {
        self.target_location = Some(location_id.into());
        self
    }

    /// Set the movement reference.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }
}

/// Inventory balance and costing ledger over a store and an item master.
pub struct StockLedger<S, I = StaticItemMaster> {
    store: S,
    items: I,
    options: ProcessorOptions,
}

impl<S: LedgerStore, I: ItemMaster> StockLedger<S, I> {
    /// Ledger with default options.
    pub fn new(store: S, items: I) -> Self {
        Self {
            store,
            items,
            options: ProcessorOptions::default(),
        }
    }

    /// Replace the processor options.
    #[must_use]
    pub fn with_options(mut self, options: ProcessorOptions) -> Self {
        self.options = options;
        self
    }

    /// The underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// The item master.
    pub const fn items(&self) -> &I {
        &self.items
    }

    /// Processor options in force.
    pub const fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Give back the store.
    pub fn into_store(self) -> S {
        self.store
    }

    fn processor(&self) -> Processor<'_, S> {
        Processor::new(&self.store, &self.items, &self.options)
    }

    /// Check a document without writing anything.
    pub fn validate(&self, document: &Document) -> LedgerResult<ValidationReport> {
        self.processor().validate(document)
    }

    /// Commit a document atomically.
    pub fn commit(&self, document: &mut Document) -> LedgerResult<CommitReport> {
        self.processor().commit(document)
    }

    /// Commit independent documents in parallel; one result per document.
    pub fn commit_documents(&self, documents: &mut [Document]) -> Vec<LedgerResult<CommitReport>> {
        let processor = self.processor();
        documents
            .par_iter_mut()
            .map(|document| processor.commit(document))
            .collect()
    }

    /// Receive stock into one row.
    pub fn apply_receipt(&self, request: ReceiptRequest) -> LedgerResult<CommitReport> {
        let ReceiptRequest {
            key,
            quantity,
            unit_cost,
            bucket,
            batch_number,
            reference,
        } = request;
        let mut line = single_line(&key, quantity).with_category(bucket);
        line.unit_cost = unit_cost;
        line.batch_number = batch_number;
        let mut document = scoped(Document::new(reference, DocumentType::GoodsReceipt), &key)
            .with_line(line);
        self.commit(&mut document)
    }

    /// Consume stock from one row.
    pub fn apply_consumption(&self, request: ConsumptionRequest) -> LedgerResult<CommitReport> {
        let line = single_line(&request.key, request.quantity).with_category(request.bucket);
        let mut document = scoped(
            Document::new(request.reference, DocumentType::StockIssue),
            &request.key,
        )
        .with_line(line);
        self.commit(&mut document)
    }

    /// Move stock between buckets, optionally to another location.
    pub fn transfer_bucket(&self, request: TransferRequest) -> LedgerResult<CommitReport> {
        let mut line = single_line(&request.key, request.quantity)
            .with_category(request.from)
            .with_target_category(request.to);
        line.target_location_id = request.target_location;
        let mut document = scoped(
            Document::new(request.reference, DocumentType::StockMovement)
                .with_movement(MovementKind::CategoryTransfer),
            &request.key,
        )
        .with_line(line);
        self.commit(&mut document)
    }

    /// Convert a costing scope to another method.
    ///
    /// `target` is a costing method name such as `"FIFO"` or
    /// `"Weighted Average"`. The item master is not updated; switching the
    /// item's method there is the caller's job.
    pub fn migrate_costing(&self, scope: &CostingScope, target: &str) -> LedgerResult<MigrationPlan> {
        self.items.require(&scope.material_id)?;
        let target = parse_target(target)?;
        CostingLedger::new(&self.store)
            .with_max_write_attempts(self.options.max_write_attempts)
            .migrate(scope, target)
    }

    /// What [`migrate_costing`](Self::migrate_costing) would do.
    pub fn preview_migration(
        &self,
        scope: &CostingScope,
        target: &str,
    ) -> LedgerResult<MigrationPlan> {
        self.items.require(&scope.material_id)?;
        CostingLedger::new(&self.store).preview_migration(scope, parse_target(target)?)
    }

    /// Rebuild the plant aggregates of one item.
    pub fn rebuild_plant_aggregate(&self, material_id: &str) -> LedgerResult<Vec<PlantStockBalance>> {
        aggregate::rebuild_plant_aggregate(&self.store, material_id, &self.options.default_plant)
    }

    /// Rebuild the plant aggregates of every item.
    pub fn rebuild_all_plant_aggregates(&self) -> LedgerResult<Vec<PlantStockBalance>> {
        aggregate::rebuild_all(&self.store, &self.items, &self.options.default_plant)
    }

    /// Current row of a key; all zero when never written.
    pub fn balance(&self, key: &BalanceKey) -> LedgerResult<BalanceRecord> {
        BalanceLedger::new(&self.store).get(key)
    }

    /// Current unit cost of a scope, if it holds any costing data.
    pub fn unit_cost(&self, scope: &CostingScope) -> LedgerResult<Option<Decimal>> {
        let profile = self.items.require(&scope.material_id)?;
        if profile.costing_method.uses_ledger() {
            CostingLedger::new(&self.store).unit_cost(scope)
        } else {
            Ok(profile.fixed_cost)
        }
    }
}

fn single_line(key: &BalanceKey, quantity: Decimal) -> DocumentLine {
    let mut line = DocumentLine::new(1, &key.material_id, quantity).at(&key.location_id);
    line.batch_id.clone_from(&key.batch_id);
    line.serial_number.clone_from(&key.serial_number);
    line
}

fn scoped(mut document: Document, key: &BalanceKey) -> Document {
    document.plant_id.clone_from(&key.plant_id);
    document.organization_id.clone_from(&key.organization_id);
    document
}
