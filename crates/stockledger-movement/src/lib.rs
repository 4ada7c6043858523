//! Movement processor for stockledger.
//!
//! Source documents (receipts, deliveries, issues, putaways, stock
//! movements and returns) are turned into balance and costing writes here.
//!
//! # Features
//!
//! - Per-line planning of bucket deltas and costing operations ([`plan_line`])
//! - Allocation validation across the lines of a document ([`AllocationSession`])
//! - All-or-nothing commit with compensation ([`Processor`])
//! - Edits of committed lines apply only the difference from the last commit
//! - Plant aggregate reconciliation ([`rebuild_plant_aggregate`])
//! - The [`StockLedger`] facade, including parallel commit of independent documents
//!
//! # Example
//!
//! ```
//! use stockledger_core::{BalanceKey, Bucket, CostingMethod, CostingScope};
//! use stockledger_movement::{
//!     ConsumptionRequest, ItemProfile, ReceiptRequest, StaticItemMaster, StockLedger,
//! };
//! use stockledger_store::MemoryStore;
//! use rust_decimal_macros::dec;
//!
//! let items = StaticItemMaster::new().with_item(ItemProfile::new("M-100", CostingMethod::Fifo));
//! let ledger = StockLedger::new(MemoryStore::new(), items);
//! let key = BalanceKey::new("M-100", "WH1");
//!
//! ledger
//!     .apply_receipt(ReceiptRequest::new(key.clone(), dec!(100)).with_unit_cost(dec!(10)))
//!     .unwrap();
//! let report = ledger
//!     .apply_consumption(ConsumptionRequest::new(key.clone(), dec!(60)))
//!     .unwrap();
//!
//! assert_eq!(report.lines[0].cost_value, Some(dec!(600)));
//! assert_eq!(ledger.balance(&key).unwrap().get(Bucket::Unrestricted), dec!(40));
//! assert_eq!(ledger.unit_cost(&CostingScope::item("M-100")).unwrap(), Some(dec!(10)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregate;
pub mod document;
pub mod item;
mod journal;
mod ledger;
mod options;
pub mod plan;
mod processor;
mod session;

pub use aggregate::{rebuild_all, rebuild_plant_aggregate};
pub use document::{Document, DocumentLine, DocumentType, LineStatus, MovementKind};
pub use item::{ItemMaster, ItemProfile, StaticItemMaster};
pub use ledger::{ConsumptionRequest, ReceiptRequest, StockLedger, TransferRequest};
pub use options::{ProcessorOptions, DEFAULT_PLANT};
pub use plan::{plan_line, BalanceOp, CostingOp, LinePlan};
pub use processor::{CommitReport, LineOutcome, Processor};
pub use session::{AllocationSession, LineCheck, LineValidation, ValidationReport};
