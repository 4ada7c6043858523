//! Source documents.
//!
//! A [`Document`] is what a document-save handler hands to the processor:
//! a type, an optional movement sub-type, a plant/organization scope and a
//! list of lines. Each line may carry its staged allocation
//! (`temp_qty_data`) and, if it was committed before and is being edited,
//! the allocation recorded at that commit (`prev_temp_qty_data`).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use stockledger_core::{AllocationPayload, Bucket, CostingScope, DeltaPolicy, LedgerResult};

/// Kind of source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Goods receipt from a supplier.
    GoodsReceipt,
    /// Goods delivery to a customer.
    GoodsDelivery,
    /// Internal stock issue.
    StockIssue,
    /// Putaway of received stock.
    Putaway,
    /// Stock movement; see [`MovementKind`].
    StockMovement,
    /// Customer return (inbound).
    SalesReturn,
    /// Return to supplier (outbound).
    PurchaseReturn,
}

impl DocumentType {
    /// Whether lines of this type add stock.
    #[must_use]
    pub const fn is_inbound(self) -> bool {
        matches!(self, Self::GoodsReceipt | Self::SalesReturn)
    }

    /// Whether lines of this type remove stock.
    #[must_use]
    pub const fn is_outbound(self) -> bool {
        matches!(
            self,
            Self::GoodsDelivery | Self::StockIssue | Self::PurchaseReturn
        )
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GoodsReceipt => "goods receipt",
            Self::GoodsDelivery => "goods delivery",
            Self::StockIssue => "stock issue",
            Self::Putaway => "putaway",
            Self::StockMovement => "stock movement",
            Self::SalesReturn => "sales return",
            Self::PurchaseReturn => "purchase return",
        };
        f.write_str(name)
    }
}

/// Sub-type of a [`DocumentType::StockMovement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Same category, another location.
    LocationTransfer,
    /// Same location, another category.
    CategoryTransfer,
    /// Another plant.
    InterFacilityTransfer,
    /// Stock written off; no destination.
    Disposal,
}

/// Line status. Only `Draft -> Committed` is driven by the ledger; the
/// fulfilment statuses belong to the calling workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    /// Not yet committed.
    #[default]
    Draft,
    /// Created by the workflow.
    Created,
    /// Partially fulfilled.
    InProgress,
    /// Fully fulfilled.
    Completed,
    /// Applied to the ledger.
    Committed,
}

/// One document line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentLine {
    /// Line number, unique within the document.
    pub line_no: u32,
    /// Item.
    pub material_id: String,
    /// Line quantity, used when the line has no allocation detail.
    #[serde(default)]
    pub quantity: Decimal,
    /// Unit cost for receipts; reinstatement cost for returned stock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
    /// Inventory category the line takes from (or receives into).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Destination category for putaway and category transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_category: Option<String>,
    /// Location of the implicit key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_id: Option<String>,
    /// Destination location for transfers and putaway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_location_id: Option<String>,
    /// Destination plant for inter-facility transfers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_plant_id: Option<String>,
    /// Batch of the implicit key; set by the ledger when a receipt creates one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Batch number requested for a new receipt lot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_number: Option<String>,
    /// Serial number of the implicit key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// Staged allocation.
    #[serde(default)]
    pub temp_qty_data: AllocationPayload,
    /// Allocation recorded at the previous commit of this line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_temp_qty_data: Option<AllocationPayload>,
    /// Line status.
    #[serde(default)]
    pub status: LineStatus,
}

impl DocumentLine {
    /// A draft line for `quantity` of an item.
    #[must_use]
    pub fn new(line_no: u32, material_id: impl Into<String>, quantity: Decimal) -> Self {
        Self {
            line_no,
            material_id: material_id.into(),
            quantity,
            unit_cost: None,
            category: None,
            target_category: None,
            location_id: None,
            target_location_id: None,
            target_plant_id: None,
            batch_id: None,
            batch_number: None,
            serial_number: None,
            temp_qty_data: AllocationPayload::default(),
            prev_temp_qty_data: None,
            status: LineStatus::Draft,
        }
    }

    /// Set the implicit key's location.
    #[must_use]
    pub fn at(mut self, location_id: impl Into<String>) -> Self {
        self.location_id = Some(location_id.into());
        self
    }

    /// Set the unit cost.
    #[must_use]
    pub fn with_unit_cost(mut self, cost: Decimal) -> Self {
        self.unit_cost = Some(cost);
        self
    }

    /// Set the source (or receiving) category.
    #[must_use]
    pub fn with_category(mut self, bucket: Bucket) -> Self {
        self.category = Some(bucket.code().to_string());
        self
    }

    /// Set the destination category.
    #[must_use]
    pub fn with_target_category(mut self, bucket: Bucket) -> Self {
        self.target_category = Some(bucket.code().to_string());
        self
    }

    /// Set the destination location.
    #[must_use]
    pub fn with_target_location(mut self, location_id: impl Into<String>) -> Self {
        self.target_location_id = Some(location_id.into());
        self
    }

    /// Set the destination plant.
    #[must_use]
    pub fn with_target_plant(mut self, plant_id: impl Into<String>) -> Self {
        self.target_plant_id = Some(plant_id.into());
        self
    }

    /// Set the batch of the implicit key.
    #[must_use]
    pub fn with_batch(mut self, batch_id: impl Into<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self
    }

    /// Request a batch number for a new lot.
    #[must_use]
    pub fn with_batch_number(mut self, batch_number: impl Into<String>) -> Self {
        self.batch_number = Some(batch_number.into());
        self
    }

    /// Set the serial number of the implicit key.
    #[must_use]
    pub fn with_serial(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Stage an allocation.
    #[must_use]
    pub fn with_allocation(mut self, allocation: impl Into<AllocationPayload>) -> Self {
        self.temp_qty_data = allocation.into();
        self
    }

    /// Parse the line's category, falling back to `default`.
    pub fn category_or(&self, default: Bucket) -> LedgerResult<Bucket> {
        parse_category(self.category.as_deref(), default)
    }

    /// Parse the line's destination category, falling back to `default`.
    pub fn target_category_or(&self, default: Bucket) -> LedgerResult<Bucket> {
        parse_category(self.target_category.as_deref(), default)
    }
}

fn parse_category(raw: Option<&str>, default: Bucket) -> LedgerResult<Bucket> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(text) => text.parse(),
    }
}

/// A source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Document id, used as receiving reference and in logs.
    pub document_id: String,
    /// Document type.
    pub document_type: DocumentType,
    /// Sub-type for stock movements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement: Option<MovementKind>,
    /// Plant the document belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<String>,
    /// Organization the document belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    /// Outbound lines take from `reserved` instead of `unrestricted`.
    #[serde(default)]
    pub reserve_before_ship: bool,
    /// Delta policy; administrative corrections may leave buckets negative.
    #[serde(default)]
    pub policy: DeltaPolicy,
    /// Lines.
    #[serde(default)]
    pub lines: Vec<DocumentLine>,
}

impl Document {
    /// An empty document.
    #[must_use]
    pub fn new(document_id: impl Into<String>, document_type: DocumentType) -> Self {
        Self {
            document_id: document_id.into(),
            document_type,
            movement: None,
            plant_id: None,
            organization_id: None,
            reserve_before_ship: false,
            policy: DeltaPolicy::Strict,
            lines: Vec::new(),
        }
    }

    /// Set the movement sub-type.
    #[must_use]
    pub fn with_movement(mut self, movement: MovementKind) -> Self {
        self.movement = Some(movement);
        self
    }

    /// Set the plant.
    #[must_use]
    pub fn with_plant(mut self, plant_id: impl Into<String>) -> Self {
        self.plant_id = Some(plant_id.into());
        self
    }

    /// Set the organization.
    #[must_use]
    pub fn with_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Take outbound quantities from `reserved`.
    #[must_use]
    pub fn reserving(mut self) -> Self {
        self.reserve_before_ship = true;
        self
    }

    /// Use a delta policy.
    #[must_use]
    pub fn with_policy(mut self, policy: DeltaPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Add a line.
    #[must_use]
    pub fn with_line(mut self, line: DocumentLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Costing scope of an item within this document's plant/organization.
    #[must_use]
    pub fn costing_scope(&self, material_id: &str) -> CostingScope {
        CostingScope {
            material_id: material_id.to_string(),
            plant_id: self.plant_id.clone(),
            organization_id: self.organization_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use stockledger_core::LedgerError;

    #[test]
    fn test_category_fallback_and_rejection() {
        let line = DocumentLine::new(1, "M1", dec!(1));
        assert_eq!(line.category_or(Bucket::Unrestricted).unwrap(), Bucket::Unrestricted);

        let line = line.with_category(Bucket::QualityInspection);
        assert_eq!(
            line.category_or(Bucket::Unrestricted).unwrap(),
            Bucket::QualityInspection
        );

        let mut line = DocumentLine::new(2, "M1", dec!(1));
        line.category = Some("Damaged".to_string());
        assert!(matches!(
            line.category_or(Bucket::Unrestricted),
            Err(LedgerError::UnknownBucket(_))
        ));
    }

    #[test]
    fn test_document_from_json() {
        let json = r#"{
            "document_id": "GD-1",
            "document_type": "goods_delivery",
            "plant_id": "P1",
            "lines": [{
                "line_no": 1,
                "material_id": "M1",
                "quantity": "5",
                "temp_qty_data": "[{\"location_id\":\"L1\",\"gd_quantity\":5}]"
            }]
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.document_type, DocumentType::GoodsDelivery);
        assert_eq!(doc.policy, DeltaPolicy::Strict);
        let line = &doc.lines[0];
        assert_eq!(line.status, LineStatus::Draft);
        assert_eq!(line.temp_qty_data.resolve().unwrap().total(), dec!(5));
        assert!(line.prev_temp_qty_data.is_none());
    }

    #[test]
    fn test_direction() {
        assert!(DocumentType::SalesReturn.is_inbound());
        assert!(DocumentType::PurchaseReturn.is_outbound());
        assert!(!DocumentType::Putaway.is_inbound());
        assert!(!DocumentType::Putaway.is_outbound());
    }
}
