//! Receipt lots.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A physical receipt lot of a batch-tracked item.
///
/// Created once per receipt and immutable afterwards, apart from the
/// linkage to the FIFO layer it seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Store-assigned batch id, used as `batch_id` in balance keys.
    pub id: String,
    /// Human facing batch number.
    pub batch_number: String,
    /// Item.
    pub material_id: String,
    /// Receiving document reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiving_reference: Option<String>,
    /// Quantity received into the lot.
    pub initial_quantity: Decimal,
    /// Receiving plant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    /// Receiving organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// FIFO layer seeded by this receipt, if the item is FIFO-costed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fifo_layer_id: Option<crate::RecordId>,
    /// Creation time.
    pub created_at: NaiveDateTime,
}

/// Input for creating a [`Batch`]; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBatch {
    /// Requested batch number; generated when absent.
    #[serde(default)]
    pub batch_number: Option<String>,
    /// Item.
    pub material_id: String,
    /// Receiving document reference.
    #[serde(default)]
    pub receiving_reference: Option<String>,
    /// Quantity received.
    pub initial_quantity: Decimal,
    /// Receiving plant.
    #[serde(default)]
    pub plant_id: Option<String>,
    /// Receiving organization.
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl NewBatch {
    /// A lot of `initial_quantity` units of an item.
    #[must_use]
    pub fn new(material_id: impl Into<String>, initial_quantity: Decimal) -> Self {
        Self {
            batch_number: None,
            material_id: material_id.into(),
            receiving_reference: None,
            initial_quantity,
            plant_id: None,
            organization_id: None,
        }
    }

    /// Use an explicit batch number.
    #[must_use]
    pub fn with_batch_number(mut self, batch_number: impl Into<String>) -> Self {
        self.batch_number = Some(batch_number.into());
        self
    }

    /// Record the receiving document.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.receiving_reference = Some(reference.into());
        self
    }

    /// Set the receiving plant.
    #[must_use]
    pub fn with_plant(mut self, plant_id: Option<String>) -> Self {
        self.plant_id = plant_id;
        self
    }

    /// Set the receiving organization.
    #[must_use]
    pub fn with_organization(mut self, organization_id: Option<String>) -> Self {
        self.organization_id = organization_id;
        self
    }
}

/// Generated batch number for the `seq`-th lot of an item.
#[must_use]
pub fn generated_batch_number(material_id: &str, seq: u64) -> String {
    format!("{material_id}-{seq:04}")
}
