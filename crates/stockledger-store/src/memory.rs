//! In-process store.

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use stockledger_core::{
    generated_batch_number, BalanceKey, BalanceRecord, Batch, CostingScope, LedgerError,
    LedgerResult, NewBatch, PlantStockBalance, RecordId,
};

use crate::snapshot::Snapshot;
use crate::{BalanceStore, BatchStore, CostingState, CostingStore, PlantBalanceStore};

#[derive(Debug, Default)]
struct Tables {
    balances: BTreeMap<BalanceKey, BalanceRecord>,
    costing: BTreeMap<CostingScope, CostingState>,
    batches: BTreeMap<String, Batch>,
    plant_balances: BTreeMap<(String, String), PlantStockBalance>,
    batch_seq: u64,
}

/// All ledger tables in memory behind one reader-writer lock.
///
/// Version checks happen under the write lock, so compare-and-swap is
/// atomic per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    next_id: AtomicU64,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every table into a serializable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let tables = self.tables.read();
        Snapshot {
            balances: tables.balances.values().cloned().collect(),
            plant_balances: tables.plant_balances.values().cloned().collect(),
            costing: tables.costing.values().cloned().collect(),
            batches: tables.batches.values().cloned().collect(),
            next_record_id: self.next_id.load(Ordering::SeqCst),
            batch_seq: tables.batch_seq,
        }
    }

    /// Rebuild a store from a snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let tables = Tables {
            balances: snapshot
                .balances
                .into_iter()
                .map(|r| (r.key.clone(), r))
                .collect(),
            costing: snapshot
                .costing
                .into_iter()
                .map(|c| (c.scope.clone(), c))
                .collect(),
            batches: snapshot
                .batches
                .into_iter()
                .map(|b| (b.id.clone(), b))
                .collect(),
            plant_balances: snapshot
                .plant_balances
                .into_iter()
                .map(|p| ((p.material_id.clone(), p.plant_id.clone()), p))
                .collect(),
            batch_seq: snapshot.batch_seq,
        };
        Self {
            tables: RwLock::new(tables),
            next_id: AtomicU64::new(snapshot.next_record_id),
        }
    }
}

impl BalanceStore for MemoryStore {
    fn get_balance(&self, key: &BalanceKey) -> LedgerResult<Option<BalanceRecord>> {
        Ok(self.tables.read().balances.get(key).cloned())
    }

    fn put_balance(&self, mut record: BalanceRecord) -> LedgerResult<BalanceRecord> {
        let mut tables = self.tables.write();
        let actual = tables.balances.get(&record.key).map_or(0, |r| r.version);
        if actual != record.version {
            return Err(LedgerError::ConcurrencyConflict {
                key: record.key.to_string(),
                expected: record.version,
                actual,
            });
        }
        record.version += 1;
        tables.balances.insert(record.key.clone(), record.clone());
        Ok(record)
    }

    fn balances_for_item(&self, material_id: &str) -> LedgerResult<Vec<BalanceRecord>> {
        Ok(self
            .tables
            .read()
            .balances
            .values()
            .filter(|r| r.key.material_id == material_id)
            .cloned()
            .collect())
    }

    fn balance_items(&self) -> LedgerResult<Vec<String>> {
        let tables = self.tables.read();
        let mut items: Vec<String> = tables
            .balances
            .keys()
            .map(|k| k.material_id.clone())
            .collect();
        items.dedup();
        Ok(items)
    }
}

impl CostingStore for MemoryStore {
    fn load_costing(&self, scope: &CostingScope) -> LedgerResult<CostingState> {
        Ok(self
            .tables
            .read()
            .costing
            .get(scope)
            .cloned()
            .unwrap_or_else(|| CostingState::empty(scope.clone())))
    }

    fn store_costing(&self, mut state: CostingState) -> LedgerResult<CostingState> {
        let mut tables = self.tables.write();
        let actual = tables.costing.get(&state.scope).map_or(0, |c| c.version);
        if actual != state.version {
            return Err(LedgerError::ConcurrencyConflict {
                key: state.scope.to_string(),
                expected: state.version,
                actual,
            });
        }
        state.version += 1;
        tables.costing.insert(state.scope.clone(), state.clone());
        Ok(state)
    }

    fn next_record_id(&self) -> RecordId {
        RecordId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn costing_scopes(&self) -> LedgerResult<Vec<CostingScope>> {
        Ok(self.tables.read().costing.keys().cloned().collect())
    }
}

impl BatchStore for MemoryStore {
    fn create_batch(&self, batch: NewBatch) -> LedgerResult<Batch> {
        let mut tables = self.tables.write();
        tables.batch_seq += 1;
        let seq = tables.batch_seq;
        let batch_number = batch
            .batch_number
            .unwrap_or_else(|| generated_batch_number(&batch.material_id, seq));
        let created = Batch {
            id: format!("BATCH-{seq:06}"),
            batch_number,
            material_id: batch.material_id,
            receiving_reference: batch.receiving_reference,
            initial_quantity: batch.initial_quantity,
            plant_id: batch.plant_id,
            organization_id: batch.organization_id,
            fifo_layer_id: None,
            created_at: Utc::now().naive_utc(),
        };
        tables.batches.insert(created.id.clone(), created.clone());
        Ok(created)
    }

    fn get_batch(&self, id: &str) -> LedgerResult<Option<Batch>> {
        Ok(self.tables.read().batches.get(id).cloned())
    }

    fn link_fifo_layer(&self, id: &str, layer: RecordId) -> LedgerResult<()> {
        let mut tables = self.tables.write();
        let batch = tables
            .batches
            .get_mut(id)
            .ok_or_else(|| LedgerError::MissingConfiguration(format!("batch {id}")))?;
        batch.fifo_layer_id = Some(layer);
        Ok(())
    }

    fn remove_batch(&self, id: &str) -> LedgerResult<()> {
        self.tables.write().batches.remove(id);
        Ok(())
    }

    fn batches_for_item(&self, material_id: &str) -> LedgerResult<Vec<Batch>> {
        Ok(self
            .tables
            .read()
            .batches
            .values()
            .filter(|b| b.material_id == material_id)
            .cloned()
            .collect())
    }
}

impl PlantBalanceStore for MemoryStore {
    fn get_plant_balance(
        &self,
        material_id: &str,
        plant_id: &str,
    ) -> LedgerResult<Option<PlantStockBalance>> {
        Ok(self
            .tables
            .read()
            .plant_balances
            .get(&(material_id.to_string(), plant_id.to_string()))
            .cloned())
    }

    fn put_plant_balance(&self, balance: PlantStockBalance) -> LedgerResult<()> {
        self.tables.write().plant_balances.insert(
            (balance.material_id.clone(), balance.plant_id.clone()),
            balance,
        );
        Ok(())
    }

    fn plant_balances_for_item(&self, material_id: &str) -> LedgerResult<Vec<PlantStockBalance>> {
        Ok(self
            .tables
            .read()
            .plant_balances
            .values()
            .filter(|p| p.material_id == material_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_put_balance_bumps_version() {
        let store = MemoryStore::new();
        let row = BalanceRecord::zero(BalanceKey::new("M1", "L1"));
        let written = store.put_balance(row).unwrap();
        assert_eq!(written.version, 1);
        let again = store.put_balance(written).unwrap();
        assert_eq!(again.version, 2);
    }

    #[test]
    fn test_costing_conflict() {
        let store = MemoryStore::new();
        let scope = CostingScope::item("M1");
        let first = store.load_costing(&scope).unwrap();
        let second = first.clone();
        store.store_costing(first).unwrap();
        let err = store.store_costing(second).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_batch_numbers_are_generated() {
        let store = MemoryStore::new();
        let a = store.create_batch(NewBatch::new("M1", dec!(10))).unwrap();
        let b = store
            .create_batch(NewBatch::new("M1", dec!(5)).with_batch_number("LOT-A"))
            .unwrap();
        assert_eq!(a.batch_number, "M1-0001");
        assert_eq!(b.batch_number, "LOT-A");
        assert_ne!(a.id, b.id);

        store.link_fifo_layer(&a.id, RecordId(9)).unwrap();
        assert_eq!(
            store.get_batch(&a.id).unwrap().unwrap().fifo_layer_id,
            Some(RecordId(9))
        );
        assert_eq!(store.batches_for_item("M1").unwrap().len(), 2);
    }

    #[test]
    fn test_record_ids_increase() {
        let store = MemoryStore::new();
        let a = store.next_record_id();
        let b = store.next_record_id();
        assert!(b > a);
    }

    #[test]
    fn test_balance_items_are_unique() {
        let store = MemoryStore::new();
        for loc in ["L1", "L2"] {
            store
                .put_balance(BalanceRecord::zero(BalanceKey::new("M1", loc)))
                .unwrap();
        }
        store
            .put_balance(BalanceRecord::zero(BalanceKey::new("M2", "L1")))
            .unwrap();
        assert_eq!(store.balance_items().unwrap(), vec!["M1", "M2"]);
    }
}
