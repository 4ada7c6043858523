//! Record of the writes a commit has made so far.

use rust_decimal::Decimal;
use std::fmt;
use stockledger_core::{BalanceKey, Bucket, CostingScope};
use stockledger_costing::{Consumption, Receipt};

/// One completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JournalEntry {
    Delta {
        key: BalanceKey,
        bucket: Bucket,
        delta: Decimal,
    },
    Move {
        key: BalanceKey,
        from: Bucket,
        to: Bucket,
        quantity: Decimal,
    },
    CostReceipt {
        scope: CostingScope,
        receipt: Receipt,
    },
    CostConsumption {
        scope: CostingScope,
        consumption: Consumption,
    },
    BatchCreated {
        id: String,
    },
}

impl fmt::Display for JournalEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delta { key, bucket, delta } => write!(f, "delta {key} {bucket} {delta:+}"),
            Self::Move {
                key,
                from,
                to,
                quantity,
            } => write!(f, "move {key} {from}->{to} {quantity}"),
            Self::CostReceipt { scope, receipt } => write!(
                f,
                "costing receipt {scope} {} @ {}",
                receipt.quantity, receipt.cost_price
            ),
            Self::CostConsumption { scope, consumption } => {
                write!(f, "costing consumption {scope} {}", consumption.quantity)
            }
            Self::BatchCreated { id } => write!(f, "batch {id}"),
        }
    }
}

/// Writes in the order they happened.
#[derive(Debug, Default)]
pub(crate) struct Journal {
    entries: Vec<JournalEntry>,
}

impl Journal {
    pub(crate) fn record(&mut self, entry: JournalEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries newest first.
    pub(crate) fn unwind(self) -> impl Iterator<Item = JournalEntry> {
        self.entries.into_iter().rev()
    }
}
