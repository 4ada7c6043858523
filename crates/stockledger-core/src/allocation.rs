//! Pending allocations ("temp quantity" data).
//!
//! A document line stages the locations, batches and serials it intends to
//! touch as a [`PendingAllocation`] before it is committed. Lines that were
//! committed earlier but are still editable also carry the previously
//! recorded allocation so that an edit applies only the difference.
//!
//! Legacy documents store these lists as JSON text, with the quantity field
//! named `gd_quantity` (deliveries) or `sm_quantity` (stock movements).
//! [`AllocationPayload`] accepts either the structured list or that text.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{BalanceKey, LedgerError, LedgerResult};

/// The (location, batch, serial) part of a balance key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllocationSlot {
    /// Storage location.
    pub location_id: String,
    /// Batch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Serial number, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl AllocationSlot {
    /// Slot at a location with no batch or serial.
    #[must_use]
    pub fn at(location_id: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            batch_id: None,
            serial_number: None,
        }
    }

    /// Full balance key for this slot.
    #[must_use]
    pub fn key(
        &self,
        material_id: &str,
        plant_id: Option<&str>,
        organization_id: Option<&str>,
    ) -> BalanceKey {
        BalanceKey {
            material_id: material_id.to_string(),
            location_id: self.location_id.clone(),
            batch_id: self.batch_id.clone(),
            serial_number: self.serial_number.clone(),
            organization_id: organization_id.map(str::to_string),
            plant_id: plant_id.map(str::to_string),
        }
    }
}

/// One staged pick or put.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationLine {
    /// Storage location.
    pub location_id: String,
    /// Batch, if the item is batch-tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Serial number, if the item is serial-tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// Allocated quantity.
    #[serde(alias = "gd_quantity", alias = "sm_quantity")]
    pub quantity: Decimal,
    /// Free text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl AllocationLine {
    /// Allocate `quantity` at a location.
    #[must_use]
    pub fn new(location_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            location_id: location_id.into(),
            batch_id: None,
            serial_number: None,
            quantity,
            remarks: None,
        }
    }

    /// Narrow to a batch.
    #[must_use]
    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    /// Narrow to a serial number.
    #[must_use]
    pub fn with_serial(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// The slot this line allocates from.
    #[must_use]
    pub fn slot(&self) -> AllocationSlot {
        AllocationSlot {
            location_id: self.location_id.clone(),
            batch_id: self.batch_id.clone(),
            serial_number: self.serial_number.clone(),
        }
    }
}

/// Typed list of staged allocations for one document line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingAllocation {
    lines: Vec<AllocationLine>,
}

impl PendingAllocation {
    /// Wrap a list of lines.
    #[must_use]
    pub fn new(lines: Vec<AllocationLine>) -> Self {
        Self { lines }
    }

    /// No allocation detail.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the legacy JSON text form.
    ///
    /// Blank text is an empty allocation. Anything that is not a list of
    /// allocation objects, or that carries a negative quantity or a blank
    /// location, is a [`LedgerError::ParseFailure`].
    pub fn parse(raw: &str) -> LedgerResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::empty());
        }
        let lines: Vec<AllocationLine> =
            serde_json::from_str(raw).map_err(|e| LedgerError::ParseFailure(e.to_string()))?;
        let parsed = Self { lines };
        parsed.check()?;
        Ok(parsed)
    }

    fn check(&self) -> LedgerResult<()> {
        for line in &self.lines {
            if line.location_id.trim().is_empty() {
                return Err(LedgerError::ParseFailure(
                    "allocation line without location_id".to_string(),
                ));
            }
            if line.quantity < Decimal::ZERO {
                return Err(LedgerError::ParseFailure(format!(
                    "negative allocation quantity {} at {}",
                    line.quantity, line.location_id
                )));
            }
        }
        Ok(())
    }

    /// Add a line.
    pub fn push(&mut self, line: AllocationLine) {
        self.lines.push(line);
    }

    /// The staged lines.
    #[must_use]
    pub fn lines(&self) -> &[AllocationLine] {
        &self.lines
    }

    /// Whether nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of all staged quantities.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Staged quantity per slot; repeated slots are summed.
    #[must_use]
    pub fn per_slot(&self) -> BTreeMap<AllocationSlot, Decimal> {
        let mut totals = BTreeMap::new();
        for line in &self.lines {
            *totals.entry(line.slot()).or_insert(Decimal::ZERO) += line.quantity;
        }
        totals
    }

    /// Staged quantity at one slot.
    #[must_use]
    pub fn quantity_at(&self, slot: &AllocationSlot) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.slot() == *slot)
            .map(|l| l.quantity)
            .sum()
    }

    /// Per-slot `self - prev`, leaving out slots whose quantity is unchanged.
    #[must_use]
    pub fn diff(&self, prev: &Self) -> Vec<(AllocationSlot, Decimal)> {
        let mut delta = self.per_slot();
        for (slot, qty) in prev.per_slot() {
            *delta.entry(slot).or_insert(Decimal::ZERO) -= qty;
        }
        delta.into_iter().filter(|(_, d)| !d.is_zero()).collect()
    }
}

impl FromIterator<AllocationLine> for PendingAllocation {
    fn from_iter<I: IntoIterator<Item = AllocationLine>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// An allocation as stored on a document line: either already structured or
/// the legacy serialized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllocationPayload {
    /// Typed list.
    Structured(PendingAllocation),
    /// JSON text awaiting [`PendingAllocation::parse`].
    Serialized(String),
}

impl AllocationPayload {
    /// The typed allocation.
    pub fn resolve(&self) -> LedgerResult<PendingAllocation> {
        match self {
            Self::Structured(allocation) => {
                allocation.check()?;
                Ok(allocation.clone())
            }
            Self::Serialized(raw) => PendingAllocation::parse(raw),
        }
    }
}

impl Default for AllocationPayload {
    fn default() -> Self {
        Self::Structured(PendingAllocation::empty())
    }
}

impl From<PendingAllocation> for AllocationPayload {
    fn from(allocation: PendingAllocation) -> Self {
        Self::Structured(allocation)
    }
}
