//! Item master seam.
//!
//! The item master is owned by another service. The ledger only needs to
//! know, per item, which costing method applies and how the item is
//! tracked.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stockledger_core::{CostingMethod, LedgerError, LedgerResult};

/// What the ledger needs to know about an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemProfile {
    /// Item.
    pub material_id: String,
    /// Costing method in force.
    pub costing_method: CostingMethod,
    /// Whether balances are kept per batch.
    #[serde(default)]
    pub batch_tracked: bool,
    /// Whether balances are kept per serial number.
    #[serde(default)]
    pub serial_tracked: bool,
    /// Unit cost for [`CostingMethod::FixedCost`] items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_cost: Option<Decimal>,
}

impl ItemProfile {
    /// An untracked item costed with `costing_method`.
    #[must_use]
    pub fn new(material_id: impl Into<String>, costing_method: CostingMethod) -> Self {
        Self {
            material_id: material_id.into(),
            costing_method,
            batch_tracked: false,
            serial_tracked: false,
            fixed_cost: None,
        }
    }

    /// Keep balances per batch.
    #[must_use]
    pub fn batch_tracked(mut self) -> Self {
        self.batch_tracked = true;
        self
    }

    /// Keep balances per serial number.
    #[must_use]
    pub fn serial_tracked(mut self) -> Self {
        self.serial_tracked = true;
        self
    }

    /// Set the fixed unit cost.
    #[must_use]
    pub fn with_fixed_cost(mut self, cost: Decimal) -> Self {
        self.fixed_cost = Some(cost);
        self
    }
}

/// Read access to the item master.
pub trait ItemMaster: Send + Sync {
    /// Profile of an item, if the item exists.
    fn profile(&self, material_id: &str) -> Option<ItemProfile>;

    /// Items the ledger keeps balances for.
    fn trackable_items(&self) -> Vec<String>;

    /// Profile of an item, or `MissingConfiguration`.
    fn require(&self, material_id: &str) -> LedgerResult<ItemProfile> {
        self.profile(material_id).ok_or_else(|| {
            LedgerError::MissingConfiguration(format!("item master entry for {material_id}"))
        })
    }
}

/// Map-backed item master.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticItemMaster {
    items: BTreeMap<String, ItemProfile>,
}

impl StaticItemMaster {
    /// An empty item master.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an item.
    #[must_use]
    pub fn with_item(mut self, profile: ItemProfile) -> Self {
        self.insert(profile);
        self
    }

    /// Add or replace an item.
    pub fn insert(&mut self, profile: ItemProfile) {
        self.items.insert(profile.material_id.clone(), profile);
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<ItemProfile> for StaticItemMaster {
    fn from_iter<I: IntoIterator<Item = ItemProfile>>(iter: I) -> Self {
        let mut master = Self::new();
        for profile in iter {
            master.insert(profile);
        }
        master
    }
}

impl ItemMaster for StaticItemMaster {
    fn profile(&self, material_id: &str) -> Option<ItemProfile> {
        self.items.get(material_id).cloned()
    }

    fn trackable_items(&self) -> Vec<String> {
        self.items.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_require_missing_item() {
        let master = StaticItemMaster::new();
        assert!(matches!(
            master.require("M1"),
            Err(LedgerError::MissingConfiguration(_))
        ));
    }

    #[test]
    fn test_lookup() {
        let master: StaticItemMaster = [
            ItemProfile::new("M1", CostingMethod::Fifo).batch_tracked(),
            ItemProfile::new("M2", CostingMethod::FixedCost).with_fixed_cost(dec!(2.5)),
        ]
        .into_iter()
        .collect();
        assert_eq!(master.len(), 2);
        assert!(master.require("M1").unwrap().batch_tracked);
        assert_eq!(master.require("M2").unwrap().fixed_cost, Some(dec!(2.5)));
        assert_eq!(master.trackable_items(), vec!["M1", "M2"]);
    }
}
