//! Plant aggregate reconciliation.
//!
//! Plant aggregates are derived data: they are rebuilt from the balance
//! rows, never adjusted incrementally, so a rebuild is idempotent.

use std::collections::{BTreeMap, BTreeSet};
use stockledger_core::{LedgerResult, PlantStockBalance};
use stockledger_store::{BalanceStore, PlantBalanceStore};
use tracing::info;

use crate::item::ItemMaster;

/// Recompute every plant aggregate of one item from its balance rows.
///
/// Rows without a plant are summed under `default_plant`. Aggregates of
/// plants that no longer hold a row are written back as zero, and an item
/// with no rows at all gets a zero aggregate for `default_plant`.
pub fn rebuild_plant_aggregate<S>(
    store: &S,
    material_id: &str,
    default_plant: &str,
) -> LedgerResult<Vec<PlantStockBalance>>
where
    S: BalanceStore + PlantBalanceStore + ?Sized,
{
    let mut plants: BTreeMap<String, PlantStockBalance> = BTreeMap::new();
    for row in store.balances_for_item(material_id)? {
        let plant = row
            .key
            .plant_id
            .clone()
            .unwrap_or_else(|| default_plant.to_string());
        plants
            .entry(plant.clone())
            .or_insert_with(|| PlantStockBalance::zero(material_id, plant))
            .absorb(&row);
    }
    for stale in store.plant_balances_for_item(material_id)? {
        plants
            .entry(stale.plant_id.clone())
            .or_insert_with(|| PlantStockBalance::zero(material_id, stale.plant_id));
    }
    if plants.is_empty() {
        plants.insert(
            default_plant.to_string(),
            PlantStockBalance::zero(material_id, default_plant),
        );
    }

    let rebuilt: Vec<PlantStockBalance> = plants.into_values().collect();
    for aggregate in &rebuilt {
        store.put_plant_balance(aggregate.clone())?;
    }
    info!(
        target: "stockledger::aggregate",
        material = material_id,
        plants = rebuilt.len(),
        "rebuilt plant aggregates"
    );
    Ok(rebuilt)
}

/// Rebuild the aggregates of every trackable item and every item with rows.
pub fn rebuild_all<S>(
    store: &S,
    items: &dyn ItemMaster,
    default_plant: &str,
) -> LedgerResult<Vec<PlantStockBalance>>
where
    S: BalanceStore + PlantBalanceStore + ?Sized,
{
    let materials: BTreeSet<String> = items
        .trackable_items()
        .into_iter()
        .chain(store.balance_items()?)
        .collect();
    let mut all = Vec::new();
    for material in &materials {
        all.extend(rebuild_plant_aggregate(store, material, default_plant)?);
    }
    Ok(all)
}
