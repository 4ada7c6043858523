//! Balance keys.
//!
//! A [`BalanceKey`] identifies one balance row: an item at a location,
//! optionally narrowed to a batch or serial number and scoped to an
//! organization and plant. The presence of a batch or serial decides which
//! table ([`Granularity`]) the row lives in.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which balance table a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    /// `item_balance`: no batch or serial.
    Plain,
    /// `item_batch_balance`.
    Batch,
    /// `item_serial_balance`.
    Serial,
}

impl Granularity {
    /// Storage table name.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Plain => "item_balance",
            Self::Batch => "item_batch_balance",
            Self::Serial => "item_serial_balance",
        }
    }
}

/// Identity of one balance row.
///
/// # Examples
///
/// ```
/// use stockledger_core::{BalanceKey, Granularity};
///
/// let key = BalanceKey::new("M-100", "WH1-A01").with_batch("B-7");
/// assert_eq!(key.granularity(), Granularity::Batch);
/// assert_eq!(key.to_string(), "M-100@WH1-A01#B-7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BalanceKey {
    /// Item.
    pub material_id: String,
    /// Storage location (bin).
    pub location_id: String,
    /// Batch, for batch-tracked items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Serial number, for serial-tracked items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// Owning organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Owning plant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
}

impl BalanceKey {
    /// Create a plain key for an item at a location.
    #[must_use]
    pub fn new(material_id: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            material_id: material_id.into(),
            location_id: location_id.into(),
            batch_id: None,
            serial_number: None,
            organization_id: None,
            plant_id: None,
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

    /// Scope to a plant.
    #[must_use]
    pub fn with_plant(mut self, plant_id: impl Into<String>) -> Self {
        self.plant_id = Some(plant_id.into());
        self
    }

    /// Scope to an organization.
    #[must_use]
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Same key at another location.
    #[must_use]
    pub fn at_location(&self, location_id: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            ..self.clone()
        }
    }

    /// Which table this key lives in. A serial number wins over a batch.
    #[must_use]
    pub const fn granularity(&self) -> Granularity {
        if self.serial_number.is_some() {
            Granularity::Serial
        } else if self.batch_id.is_some() {
            Granularity::Batch
        } else {
            Granularity::Plain
        }
    }
}

impl fmt::Display for BalanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.material_id, self.location_id)?;
        if let Some(batch) = &self.batch_id {
            write!(f, "#{batch}")?;
        }
        if let Some(serial) = &self.serial_number {
            write!(f, "/{serial}")?;
        }
        if let Some(plant) = &self.plant_id {
            write!(f, " [{plant}]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity() {
        let plain = BalanceKey::new("M1", "L1");
        assert_eq!(plain.granularity(), Granularity::Plain);
        assert_eq!(plain.granularity().table(), "item_balance");

        let serial = BalanceKey::new("M1", "L1").with_batch("B1").with_serial("S1");
        assert_eq!(serial.granularity(), Granularity::Serial);
    }

    #[test]
    fn test_at_location_keeps_batch() {
        let key = BalanceKey::new("M1", "L1").with_batch("B1").with_plant("P1");
        let moved = key.at_location("L2");
        assert_eq!(moved.location_id, "L2");
        assert_eq!(moved.batch_id.as_deref(), Some("B1"));
        assert_eq!(moved.plant_id.as_deref(), Some("P1"));
    }

    #[test]
    fn test_display() {
        let key = BalanceKey::new("M1", "L1").with_serial("S9").with_plant("P1");
        assert_eq!(key.to_string(), "M1@L1/S9 [P1]");
    }
}
