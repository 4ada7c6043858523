//! Line planning.
//!
//! [`plan_line`] turns one document line into the balance primitives and
//! costing operations that committing it would perform, without touching
//! storage. The allocation validation session and the processor share it,
//! so what is validated is exactly what gets applied.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use stockledger_core::{
    AllocationLine, AllocationSlot, BalanceKey, Bucket, CostingScope, DeltaPolicy, LedgerError,
    LedgerResult, PendingAllocation,
};
use tracing::warn;

use crate::document::{Document, DocumentLine, DocumentType, MovementKind};
use crate::item::ItemProfile;

/// One balance primitive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BalanceOp {
    /// `apply_delta`.
    Delta {
        /// Row.
        key: BalanceKey,
        /// Bucket.
        bucket: Bucket,
        /// Signed delta.
        delta: Decimal,
    },
    /// `move_bucket` on a single row.
    Move {
        /// Row.
        key: BalanceKey,
        /// Source bucket.
        from: Bucket,
        /// Destination bucket.
        to: Bucket,
        /// Positive quantity.
        quantity: Decimal,
    },
}

impl BalanceOp {
    /// Signed per-bucket effects of this primitive.
    #[must_use]
    pub fn effects(&self) -> Vec<(BalanceKey, Bucket, Decimal)> {
        match self {
            Self::Delta { key, bucket, delta } => vec![(key.clone(), *bucket, *delta)],
            Self::Move {
                key,
                from,
                to,
                quantity,
            } => vec![
                (key.clone(), *from, -*quantity),
                (key.clone(), *to, *quantity),
            ],
        }
    }

    /// Row this primitive writes.
    #[must_use]
    pub const fn key(&self) -> &BalanceKey {
        match self {
            Self::Delta { key, .. } | Self::Move { key, .. } => key,
        }
    }
}

impl fmt::Display for BalanceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delta { key, bucket, delta } => write!(f, "{key} {bucket} {delta:+}"),
            Self::Move {
                key,
                from,
                to,
                quantity,
            } => write!(f, "{key} {from}->{to} {quantity}"),
        }
    }
}

/// One costing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CostingOp {
    /// Add stock to the costing ledger.
    Receive {
        /// Scope.
        scope: CostingScope,
        /// Quantity.
        quantity: Decimal,
        /// Cost; the current unit cost is used when absent.
        unit_cost: Option<Decimal>,
        /// Batch the FIFO layer belongs to.
        batch_id: Option<String>,
    },
    /// Take stock out of the costing ledger.
    Consume {
        /// Scope.
        scope: CostingScope,
        /// Quantity.
        quantity: Decimal,
    },
    /// Consume in one scope and receive the realised cost in another.
    Transfer {
        /// Source scope.
        from: CostingScope,
        /// Destination scope.
        to: CostingScope,
        /// Quantity.
        quantity: Decimal,
    },
}

/// Everything committing one line would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePlan {
    /// Line number.
    pub line_no: u32,
    /// Item.
    pub material_id: String,
    /// Balance primitives, in application order.
    pub balance_ops: Vec<BalanceOp>,
    /// Costing operations, in application order.
    pub costing_ops: Vec<CostingOp>,
    /// Net quantity change of the line (new minus previous).
    pub net_quantity: Decimal,
    /// The allocation this commit stands for; becomes `prev_temp_qty_data`.
    pub effective_allocation: PendingAllocation,
    /// Why the staged allocation was ignored, if it was.
    pub degraded: Option<String>,
}

impl LinePlan {
    /// Whether a receipt would need a batch the line does not name yet.
    #[must_use]
    pub fn needs_batch(&self) -> bool {
        self.balance_ops
            .iter()
            .any(|op| op.key().batch_id.is_none() && op.effects().iter().any(|e| e.2 > Decimal::ZERO))
    }
}

/// Plan one line of a document.
pub fn plan_line(
    document: &Document,
    line: &DocumentLine,
    profile: &ItemProfile,
) -> LedgerResult<LinePlan> {
    let mut degraded = None;
    let staged = match line.temp_qty_data.resolve() {
        Ok(allocation) => allocation,
        Err(LedgerError::ParseFailure(reason)) => {
            warn!(
                target: "stockledger::movement",
                document = %document.document_id,
                line = line.line_no,
                %reason,
                "ignoring malformed allocation"
            );
            degraded = Some(reason);
            PendingAllocation::empty()
        }
        Err(other) => return Err(other),
    };

    // Without a readable previous allocation the difference cannot be
    // computed, so the line is refused.
    let previous = match &line.prev_temp_qty_data {
        None => None,
        Some(payload) => Some(payload.resolve().map_err(|err| match err {
            LedgerError::ParseFailure(reason) => LedgerError::ParseFailure(format!(
                "previous allocation of line {}: {reason}",
                line.line_no
            )),
            other => other,
        })?),
    };

    let effective = effective_allocation(line, staged, previous.is_some())?;
    check_tracking(document, line, profile, &effective)?;

    let deltas: Vec<(AllocationSlot, Decimal)> = match &previous {
        Some(prev) => effective.diff(prev),
        None => effective
            .per_slot()
            .into_iter()
            .filter(|(_, q)| !q.is_zero())
            .collect(),
    };
    let net_quantity: Decimal = deltas.iter().map(|(_, d)| *d).sum();

    let mut plan = LinePlan {
        line_no: line.line_no,
        material_id: line.material_id.clone(),
        balance_ops: Vec::new(),
        costing_ops: Vec::new(),
        net_quantity,
        effective_allocation: effective,
        degraded,
    };
    let keyed = |slot: &AllocationSlot| {
        slot.key(
            &line.material_id,
            document.plant_id.as_deref(),
            document.organization_id.as_deref(),
        )
    };
    let scope = document.costing_scope(&line.material_id);
    let costed = profile.costing_method.uses_ledger();

    match (document.document_type, document.movement) {
        (DocumentType::GoodsReceipt | DocumentType::SalesReturn, _) => {
            let bucket = line.category_or(Bucket::Unrestricted)?;
            if costed && document.document_type == DocumentType::GoodsReceipt
                && net_quantity > Decimal::ZERO
                && line.unit_cost.is_none()
            {
                return Err(LedgerError::MissingConfiguration(format!(
                    "unit cost for line {} of {}",
                    line.line_no, document.document_id
                )));
            }
            for (slot, delta) in &deltas {
                plan.balance_ops.push(BalanceOp::Delta {
                    key: keyed(slot),
                    bucket,
                    delta: *delta,
                });
            }
            if costed {
                plan.costing_ops.extend(inbound_costing(line, scope, net_quantity));
            }
        }
        (
            DocumentType::GoodsDelivery | DocumentType::StockIssue | DocumentType::PurchaseReturn,
            _,
        )
        | (DocumentType::StockMovement, Some(MovementKind::Disposal)) => {
            let default = if document.reserve_before_ship {
                Bucket::Reserved
            } else {
                Bucket::Unrestricted
            };
            let bucket = line.category_or(default)?;
            for (slot, delta) in &deltas {
                plan.balance_ops.push(BalanceOp::Delta {
                    key: keyed(slot),
                    bucket,
                    delta: -*delta,
                });
            }
            if costed {
                plan.costing_ops.extend(outbound_costing(line, scope, net_quantity));
            }
        }
        (DocumentType::Putaway, _) => {
            let from = line.category_or(Bucket::QualityInspection)?;
            let to = line.target_category_or(Bucket::Unrestricted)?;
            let target = line.target_location_id.as_deref();
            plan.balance_ops = transfer_ops(&deltas, document.policy, from, to, |slot| {
                let key = keyed(slot);
                let dest = target.map_or_else(|| key.clone(), |loc| key.at_location(loc));
                (key, dest)
            });
        }
        (DocumentType::StockMovement, Some(MovementKind::LocationTransfer)) => {
            let from = line.category_or(Bucket::Unrestricted)?;
            let to = line.target_category_or(from)?;
            let target = required(&line.target_location_id, "target location", line, document)?;
            plan.balance_ops = transfer_ops(&deltas, document.policy, from, to, |slot| {
                let key = keyed(slot);
                let dest = key.at_location(target);
                (key, dest)
            });
        }
        (DocumentType::StockMovement, Some(MovementKind::CategoryTransfer)) => {
            let from = line.category_or(Bucket::Unrestricted)?;
            required(&line.target_category, "target category", line, document)?;
            let to = line.target_category_or(from)?;
            let target = line.target_location_id.as_deref();
            plan.balance_ops = transfer_ops(&deltas, document.policy, from, to, |slot| {
                let key = keyed(slot);
                let dest = target.map_or_else(|| key.clone(), |loc| key.at_location(loc));
                (key, dest)
            });
        }
        (DocumentType::StockMovement, Some(MovementKind::InterFacilityTransfer)) => {
            let from = line.category_or(Bucket::Unrestricted)?;
            let to = line.target_category_or(Bucket::Unrestricted)?;
            let plant = required(&line.target_plant_id, "target plant", line, document)?;
            let target = line.target_location_id.as_deref();
            plan.balance_ops = transfer_ops(&deltas, document.policy, from, to, |slot| {
                let key = keyed(slot);
                let mut dest = target.map_or_else(|| key.clone(), |loc| key.at_location(loc));
                dest.plant_id = Some(plant.to_string());
                (key, dest)
            });
            let dest_scope = scope.clone().with_plant(plant);
            if costed && dest_scope != scope && !net_quantity.is_zero() {
                plan.costing_ops.push(if net_quantity > Decimal::ZERO {
                    CostingOp::Transfer {
                        from: scope,
                        to: dest_scope,
                        quantity: net_quantity,
                    }
                } else {
                    CostingOp::Transfer {
                        from: dest_scope,
                        to: scope,
                        quantity: -net_quantity,
                    }
                });
            }
        }
        (DocumentType::StockMovement, None) => {
            return Err(LedgerError::MissingConfiguration(format!(
                "movement kind of stock movement {}",
                document.document_id
            )));
        }
    }

    Ok(plan)
}

/// The allocation a line stands for: its staged allocation, or the implicit
/// single key built from the line's own fields.
fn effective_allocation(
    line: &DocumentLine,
    staged: PendingAllocation,
    is_edit: bool,
) -> LedgerResult<PendingAllocation> {
    let mut effective = if staged.is_empty() {
        if line.quantity < Decimal::ZERO || (line.quantity.is_zero() && !is_edit) {
            return Err(LedgerError::invalid_quantity(
                line.quantity,
                format!("line {} quantity must be positive", line.line_no),
            ));
        }
        if line.quantity.is_zero() {
            return Ok(PendingAllocation::empty());
        }
        let location = line.location_id.clone().ok_or_else(|| {
            LedgerError::MissingConfiguration(format!("location for line {}", line.line_no))
        })?;
        let mut implicit = AllocationLine::new(location, line.quantity);
        implicit.batch_id = line.batch_id.clone();
        implicit.serial_number = line.serial_number.clone();
        PendingAllocation::new(vec![implicit])
    } else {
        staged
    };

    if let Some(batch) = &line.batch_id {
        effective = effective
            .lines()
            .iter()
            .cloned()
            .map(|mut l| {
                if l.batch_id.is_none() {
                    l.batch_id = Some(batch.clone());
                }
                l
            })
            .collect();
    }
    Ok(effective)
}

fn check_tracking(
    document: &Document,
    line: &DocumentLine,
    profile: &ItemProfile,
    allocation: &PendingAllocation,
) -> LedgerResult<()> {
    for slot in allocation.lines() {
        if profile.serial_tracked && slot.serial_number.is_none() {
            return Err(LedgerError::MissingConfiguration(format!(
                "serial number for serial-tracked {} on line {}",
                line.material_id, line.line_no
            )));
        }
        // inbound lines get a batch created at commit
        if profile.batch_tracked
            && slot.batch_id.is_none()
            && !document.document_type.is_inbound()
        {
            return Err(LedgerError::MissingConfiguration(format!(
                "batch for batch-tracked {} on line {}",
                line.material_id, line.line_no
            )));
        }
    }
    Ok(())
}

fn required<'a>(
    value: &'a Option<String>,
    what: &str,
    line: &DocumentLine,
    document: &Document,
) -> LedgerResult<&'a str> {
    value.as_deref().ok_or_else(|| {
        LedgerError::MissingConfiguration(format!(
            "{what} for line {} of {}",
            line.line_no, document.document_id
        ))
    })
}

/// Bucket/location transfer primitives for each slot delta.
///
/// A positive delta moves `from -> to`; a negative one (an edit that moves
/// less than before) moves back. Same-row transfers use `move_bucket`,
/// which never underflows, so corrections get a delta pair instead.
fn transfer_ops(
    deltas: &[(AllocationSlot, Decimal)],
    policy: DeltaPolicy,
    from: Bucket,
    to: Bucket,
    keys: impl Fn(&AllocationSlot) -> (BalanceKey, BalanceKey),
) -> Vec<BalanceOp> {
    let mut ops = Vec::new();
    for (slot, delta) in deltas {
        let (src, dst) = keys(slot);
        let (src, src_bucket, dst, dst_bucket, quantity) = if *delta > Decimal::ZERO {
            (src, from, dst, to, *delta)
        } else {
            (dst, to, src, from, -*delta)
        };
        if src == dst && (src_bucket == dst_bucket || policy == DeltaPolicy::Strict) {
            if src_bucket != dst_bucket {
                ops.push(BalanceOp::Move {
                    key: src,
                    from: src_bucket,
                    to: dst_bucket,
                    quantity,
                });
            }
        } else {
            ops.push(BalanceOp::Delta {
                key: src,
                bucket: src_bucket,
                delta: -quantity,
            });
            ops.push(BalanceOp::Delta {
                key: dst,
                bucket: dst_bucket,
                delta: quantity,
            });
        }
    }
    ops
}

fn inbound_costing(line: &DocumentLine, scope: CostingScope, net: Decimal) -> Option<CostingOp> {
    if net > Decimal::ZERO {
        Some(CostingOp::Receive {
            scope,
            quantity: net,
            unit_cost: line.unit_cost,
            batch_id: line.batch_id.clone(),
        })
    } else if net < Decimal::ZERO {
        Some(CostingOp::Consume {
            scope,
            quantity: -net,
        })
    } else {
        None
    }
}

fn outbound_costing(line: &DocumentLine, scope: CostingScope, net: Decimal) -> Option<CostingOp> {
    if net > Decimal::ZERO {
        Some(CostingOp::Consume {
            scope,
            quantity: net,
        })
    } else if net < Decimal::ZERO {
        Some(CostingOp::Receive {
            scope,
            quantity: -net,
            unit_cost: line.unit_cost,
            batch_id: None,
        })
    } else {
        None
    }
}
