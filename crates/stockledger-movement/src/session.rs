//! Allocation validation across the lines of one document.
//!
//! Several lines of a document can pick from the same balance row. Each
//! line is checked against the stored balance plus the signed effect of the
//! earlier lines of the same document, so a document that over-allocates a
//! row is rejected before anything is written.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt;
use stockledger_core::{BalanceKey, Bucket, DeltaPolicy, LedgerError, LedgerResult};
use stockledger_store::BalanceStore;

use crate::document::Document;
use crate::item::ItemMaster;
use crate::plan::{plan_line, BalanceOp, LinePlan};

/// Outcome of checking one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineCheck {
    /// The line can be committed.
    Passed,
    /// The line can be committed, but its staged allocation was ignored.
    Degraded(String),
    /// The line cannot be committed.
    Rejected(LedgerError),
}

/// Check result for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineValidation {
    /// Line number.
    pub line_no: u32,
    /// Outcome.
    pub check: LineCheck,
}

/// Check results for a whole document, in line order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Document checked.
    pub document_id: String,
    /// One entry per line.
    pub lines: Vec<LineValidation>,
}

impl ValidationReport {
    /// Whether every line passed.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.first_rejection().is_none()
    }

    /// The first rejected line and its error.
    #[must_use]
    pub fn first_rejection(&self) -> Option<(u32, &LedgerError)> {
        self.lines.iter().find_map(|l| match &l.check {
            LineCheck::Rejected(err) => Some((l.line_no, err)),
            _ => None,
        })
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.document_id)?;
        for line in &self.lines {
            match &line.check {
                LineCheck::Passed => writeln!(f, "  line {}: ok", line.line_no)?,
                LineCheck::Degraded(why) => {
                    writeln!(f, "  line {}: ok (allocation ignored: {why})", line.line_no)?;
                }
                LineCheck::Rejected(err) => {
                    writeln!(f, "  line {}: {} {err}", line.line_no, err.code())?;
                }
            }
        }
        Ok(())
    }
}

/// Planned lines of one document, checked against stored balances.
pub struct AllocationSession<'a, S: ?Sized> {
    store: &'a S,
    document: &'a Document,
    plans: Vec<LedgerResult<LinePlan>>,
}

impl<'a, S: BalanceStore + ?Sized> AllocationSession<'a, S> {
    /// Plan every line of `document`.
    pub fn new(store: &'a S, items: &dyn ItemMaster, document: &'a Document) -> Self {
        let plans = document
            .lines
            .iter()
            .map(|line| {
                items
                    .require(&line.material_id)
                    .and_then(|profile| plan_line(document, line, &profile))
            })
            .collect();
        Self {
            store,
            document,
            plans,
        }
    }

    /// Plans in line order.
    pub fn plans(&self) -> &[LedgerResult<LinePlan>] {
        &self.plans
    }

    /// Take the plans.
    pub fn into_plans(self) -> Vec<LedgerResult<LinePlan>> {
        self.plans
    }

    /// What line `line_index` may still take from a bucket: the stored
    /// quantity less every decrement the other lines have staged there.
    pub fn available(
        &self,
        line_index: usize,
        key: &BalanceKey,
        bucket: Bucket,
    ) -> LedgerResult<Decimal> {
        let on_hand = self.on_hand(key, bucket)?;
        let staged: Decimal = self
            .plans
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != line_index)
            .filter_map(|(_, plan)| plan.as_ref().ok())
            .flat_map(|plan| plan.balance_ops.iter().flat_map(BalanceOp::effects))
            .filter(|(k, b, d)| k == key && *b == bucket && *d < Decimal::ZERO)
            .map(|(_, _, d)| -d)
            .sum();
        Ok(on_hand - staged)
    }

    /// Check every line in order.
    ///
    /// A rejected line does not count against later lines. Store read
    /// failures abort the check.
    pub fn validate(&self) -> LedgerResult<ValidationReport> {
        let mut pending: BTreeMap<(BalanceKey, Bucket), Decimal> = BTreeMap::new();
        let mut lines = Vec::with_capacity(self.plans.len());

        for (line, plan) in self.document.lines.iter().zip(&self.plans) {
            let check = match plan {
                Err(err) => LineCheck::Rejected(err.clone()),
                Ok(plan) => {
                    let nets = net_effects(plan);
                    match self.shortfall(&nets, &pending)? {
                        Some(err) => LineCheck::Rejected(err),
                        None => {
                            for (slot, net) in nets {
                                *pending.entry(slot).or_default() += net;
                            }
                            plan.degraded
                                .clone()
                                .map_or(LineCheck::Passed, LineCheck::Degraded)
                        }
                    }
                }
            };
            lines.push(LineValidation {
                line_no: line.line_no,
                check,
            });
        }

        Ok(ValidationReport {
            document_id: self.document.document_id.clone(),
            lines,
        })
    }

    fn shortfall(
        &self,
        nets: &BTreeMap<(BalanceKey, Bucket), Decimal>,
        pending: &BTreeMap<(BalanceKey, Bucket), Decimal>,
    ) -> LedgerResult<Option<LedgerError>> {
        if self.document.policy == DeltaPolicy::AdministrativeCorrection {
            return Ok(None);
        }
        for ((key, bucket), net) in nets {
            if *net >= Decimal::ZERO {
                continue;
            }
            let earlier = pending
                .get(&(key.clone(), *bucket))
                .copied()
                .unwrap_or_default();
            let available = self.on_hand(key, *bucket)? + earlier;
            if -*net > available {
                return Ok(Some(LedgerError::InsufficientBalance {
                    key: key.to_string(),
                    bucket: Some(*bucket),
                    requested: -*net,
                    available,
                }));
            }
        }
        Ok(None)
    }

    fn on_hand(&self, key: &BalanceKey, bucket: Bucket) -> LedgerResult<Decimal> {
        Ok(self
            .store
            .get_balance(key)?
            .map_or(Decimal::ZERO, |row| row.get(bucket)))
    }
}

fn net_effects(plan: &LinePlan) -> BTreeMap<(BalanceKey, Bucket), Decimal> {
    let mut nets = BTreeMap::new();
    for (key, bucket, delta) in plan.balance_ops.iter().flat_map(BalanceOp::effects) {
        *nets.entry((key, bucket)).or_insert(Decimal::ZERO) += delta;
    }
    nets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentLine, DocumentType};
    use crate::item::{ItemProfile, StaticItemMaster};
    use rust_decimal_macros::dec;
    use stockledger_core::CostingMethod;
    use stockledger_store::{BalanceLedger, MemoryStore};

    fn stocked(qty: Decimal) -> (MemoryStore, StaticItemMaster) {
        let store = MemoryStore::new();
        BalanceLedger::new(&store)
            .apply_delta(
                &BalanceKey::new("M1", "L1"),
                Bucket::Unrestricted,
                qty,
                DeltaPolicy::Strict,
            )
            .unwrap();
        let items = StaticItemMaster::new().with_item(ItemProfile::new("M1", CostingMethod::Fifo));
        (store, items)
    }

    fn two_line_delivery() -> Document {
        Document::new("GD-1", DocumentType::GoodsDelivery)
            .with_line(DocumentLine::new(1, "M1", dec!(80)).at("L1"))
            .with_line(DocumentLine::new(2, "M1", dec!(30)).at("L1"))
    }

    #[test]
    fn test_second_line_sees_first_lines_pick() {
        let (store, items) = stocked(dec!(100));
        let doc = two_line_delivery();
        let session = AllocationSession::new(&store, &items, &doc);
        let report = session.validate().unwrap();

        assert_eq!(report.lines[0].check, LineCheck::Passed);
        match &report.lines[1].check {
            LineCheck::Rejected(LedgerError::InsufficientBalance {
                requested,
                available,
                ..
            }) => {
                assert_eq!(*requested, dec!(30));
                assert_eq!(*available, dec!(20));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(report.first_rejection().map(|(n, _)| n), Some(2));
    }

    #[test]
    fn test_available_excludes_siblings() {
        let (store, items) = stocked(dec!(100));
        let doc = two_line_delivery();
        let session = AllocationSession::new(&store, &items, &doc);
        let key = BalanceKey::new("M1", "L1");
        assert_eq!(
            session.available(0, &key, Bucket::Unrestricted).unwrap(),
            dec!(70)
        );
        assert_eq!(
            session.available(1, &key, Bucket::Unrestricted).unwrap(),
            dec!(20)
        );
    }

    #[test]
    fn test_administrative_correction_skips_check() {
        let (store, items) = stocked(dec!(10));
        let doc = two_line_delivery().with_policy(DeltaPolicy::AdministrativeCorrection);
        let report = AllocationSession::new(&store, &items, &doc)
            .validate()
            .unwrap();
        assert!(report.is_ok());
    }

    #[test]
    fn test_unknown_item_rejected() {
        let (store, items) = stocked(dec!(10));
        let doc = Document::new("GD-2", DocumentType::GoodsDelivery)
            .with_line(DocumentLine::new(1, "NOPE", dec!(1)).at("L1"));
        let report = AllocationSession::new(&store, &items, &doc)
            .validate()
            .unwrap();
        assert!(matches!(
            report.first_rejection(),
            Some((1, LedgerError::MissingConfiguration(_)))
        ));
    }
}
