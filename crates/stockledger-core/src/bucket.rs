//! Inventory buckets and per-bucket quantities.
//!
//! Every balance row partitions its quantity into five status buckets.
//! [`Bucket`] is the closed set of those statuses; [`BucketQuantities`]
//! holds one decimal per bucket using the storage field names
//! (`block_qty`, `reserved_qty`, ...).
//!
//! Category strings coming from documents (`"UNR"`, `"Quality Inspection"`,
//! `"qualityinsp_qty"`, ...) are mapped through [`Bucket::from_str`], which
//! rejects anything it does not recognise instead of defaulting.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LedgerError;

/// An inventory status bucket.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Stock that may not be used (`BLK`).
    Blocked,
    /// Stock set aside for a document (`RES`).
    Reserved,
    /// Freely usable stock (`UNR`).
    #[default]
    Unrestricted,
    /// Stock awaiting quality inspection (`QIP`).
    QualityInspection,
    /// Stock on its way between facilities (`ITR`).
    InTransit,
}

/// Mapping table: bucket, short code, storage field, display name.
const BUCKET_TABLE: [(Bucket, &str, &str, &str); 5] = [
    (Bucket::Blocked, "BLK", "block_qty", "Blocked"),
    (Bucket::Reserved, "RES", "reserved_qty", "Reserved"),
    (Bucket::Unrestricted, "UNR", "unrestricted_qty", "Unrestricted"),
    (
        Bucket::QualityInspection,
        "QIP",
        "qualityinsp_qty",
        "Quality Inspection",
    ),
    (Bucket::InTransit, "ITR", "intransit_qty", "In Transit"),
];

impl Bucket {
    /// All buckets in storage order.
    pub const ALL: [Self; 5] = [
        Self::Blocked,
        Self::Reserved,
        Self::Unrestricted,
        Self::QualityInspection,
        Self::InTransit,
    ];

    /// Short category code used by documents (`"UNR"`, `"QIP"`, ...).
    #[must_use]
    pub const fn code(self) -> &'static str {
        BUCKET_TABLE[self.index()].1
    }

    /// Storage field name (`"unrestricted_qty"`, ...).
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        BUCKET_TABLE[self.index()].2
    }

    /// Human readable category name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        BUCKET_TABLE[self.index()].3
    }

    const fn index(self) -> usize {
        match self {
            Self::Blocked => 0,
            Self::Reserved => 1,
            Self::Unrestricted => 2,
            Self::QualityInspection => 3,
            Self::InTransit => 4,
        }
    }
}

impl FromStr for Bucket {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        BUCKET_TABLE
            .iter()
            .find(|(_, code, field, display)| {
                needle.eq_ignore_ascii_case(code)
                    || needle.eq_ignore_ascii_case(field)
                    || needle.eq_ignore_ascii_case(display)
            })
            .map(|(bucket, ..)| *bucket)
            .ok_or_else(|| LedgerError::UnknownBucket(s.to_string()))
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One quantity per bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketQuantities {
    /// Blocked stock.
    #[serde(default)]
    pub block_qty: Decimal,
    /// Reserved stock.
    #[serde(default)]
    pub reserved_qty: Decimal,
    /// Unrestricted stock.
    #[serde(default)]
    pub unrestricted_qty: Decimal,
    /// Stock in quality inspection.
    #[serde(default)]
    pub qualityinsp_qty: Decimal,
    /// Stock in transit.
    #[serde(default)]
    pub intransit_qty: Decimal,
}

impl BucketQuantities {
    /// All buckets at zero.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Quantity held in one bucket.
    #[must_use]
    pub const fn get(&self, bucket: Bucket) -> Decimal {
        match bucket {
            Bucket::Blocked => self.block_qty,
            Bucket::Reserved => self.reserved_qty,
            Bucket::Unrestricted => self.unrestricted_qty,
            Bucket::QualityInspection => self.qualityinsp_qty,
            Bucket::InTransit => self.intransit_qty,
        }
    }

    /// Mutable access to one bucket.
    pub fn get_mut(&mut self, bucket: Bucket) -> &mut Decimal {
        match bucket {
            Bucket::Blocked => &mut self.block_qty,
            Bucket::Reserved => &mut self.reserved_qty,
            Bucket::Unrestricted => &mut self.unrestricted_qty,
            Bucket::QualityInspection => &mut self.qualityinsp_qty,
            Bucket::InTransit => &mut self.intransit_qty,
        }
    }

    /// Sum of all buckets.
    #[must_use]
    pub fn total(&self) -> Decimal {
        Bucket::ALL.iter().map(|b| self.get(*b)).sum()
    }

    /// Whether every bucket is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        Bucket::ALL.iter().all(|b| self.get(*b).is_zero())
    }

    /// Whether any bucket is below zero.
    #[must_use]
    pub fn has_negative(&self) -> bool {
        Bucket::ALL.iter().any(|b| self.get(*b) < Decimal::ZERO)
    }

    /// Add every bucket of `other` into `self`.
    pub fn accumulate(&mut self, other: &Self) {
        for bucket in Bucket::ALL {
            *self.get_mut(bucket) += other.get(bucket);
        }
    }
}
