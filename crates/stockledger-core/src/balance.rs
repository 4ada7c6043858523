//! Balance rows.
//!
//! A [`BalanceRecord`] is one row of `item_balance` / `item_batch_balance` /
//! `item_serial_balance`. A [`PlantStockBalance`] is the derived per-plant
//! aggregate. Both keep `balance_quantity` equal to the sum of their buckets.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{BalanceKey, Bucket, BucketQuantities, LedgerError, LedgerResult};

/// Whether a delta may drive a bucket below zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaPolicy {
    /// Reject any delta that leaves a bucket negative.
    #[default]
    Strict,
    /// Administrative correction: negative buckets are tolerated.
    AdministrativeCorrection,
}

/// One balance row with its optimistic-concurrency version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    /// Row identity.
    #[serde(flatten)]
    pub key: BalanceKey,
    /// Bucket quantities.
    #[serde(flatten)]
    pub quantities: BucketQuantities,
    /// Sum of all buckets.
    pub balance_quantity: Decimal,
    /// Incremented by the store on every successful write; 0 means never written.
    #[serde(default)]
    pub version: u64,
}

impl BalanceRecord {
    /// An all-zero row for a key that has never been written.
    #[must_use]
    pub fn zero(key: BalanceKey) -> Self {
        Self {
            key,
            quantities: BucketQuantities::zero(),
            balance_quantity: Decimal::ZERO,
            version: 0,
        }
    }

    /// Quantity in one bucket.
    #[must_use]
    pub const fn get(&self, bucket: Bucket) -> Decimal {
        self.quantities.get(bucket)
    }

    /// Whether `balance_quantity` matches the bucket sum.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.balance_quantity == self.quantities.total()
    }

    /// Add a signed delta to one bucket and recompute the total.
    ///
    /// Under [`DeltaPolicy::Strict`] a decrement that would leave the
    /// bucket negative is rejected and the record is left untouched.
    /// Increments are always accepted, even into a bucket an earlier
    /// correction left negative.
    pub fn apply_delta(
        &mut self,
        bucket: Bucket,
        delta: Decimal,
        policy: DeltaPolicy,
    ) -> LedgerResult<()> {
        let current = self.quantities.get(bucket);
        let next = current + delta;
        if delta < Decimal::ZERO && next < Decimal::ZERO && policy == DeltaPolicy::Strict {
            return Err(LedgerError::InsufficientBalance {
                key: self.key.to_string(),
                bucket: Some(bucket),
                requested: -delta,
                available: current,
            });
        }
        *self.quantities.get_mut(bucket) = next;
        self.balance_quantity = self.quantities.total();
        Ok(())
    }

    /// Move `quantity` from one bucket to another on this row.
    ///
    /// The total is unchanged. `quantity` must be positive and must not
    /// exceed what `from` currently holds.
    pub fn move_bucket(&mut self, from: Bucket, to: Bucket, quantity: Decimal) -> LedgerResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(LedgerError::invalid_quantity(
                quantity,
                "bucket transfer quantity must be positive",
            ));
        }
        let available = self.quantities.get(from);
        if quantity > available {
            return Err(LedgerError::InsufficientBalance {
                key: self.key.to_string(),
                bucket: Some(from),
                requested: quantity,
                available,
            });
        }
        *self.quantities.get_mut(from) -= quantity;
        *self.quantities.get_mut(to) += quantity;
        self.balance_quantity = self.quantities.total();
        Ok(())
    }
}

/// Per-plant aggregate of all balance rows of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlantStockBalance {
    /// Item.
    pub material_id: String,
    /// Plant, or the synthetic default plant for unscoped rows.
    pub plant_id: String,
    /// Summed bucket quantities.
    #[serde(flatten)]
    pub quantities: BucketQuantities,
    /// Sum of all buckets.
    pub balance_quantity: Decimal,
}

impl PlantStockBalance {
    /// An all-zero aggregate.
    #[must_use]
    pub fn zero(material_id: impl Into<String>, plant_id: impl Into<String>) -> Self {
        Self {
            material_id: material_id.into(),
            plant_id: plant_id.into(),
            quantities: BucketQuantities::zero(),
            balance_quantity: Decimal::ZERO,
        }
    }

    /// Fold one balance row into this aggregate.
    pub fn absorb(&mut self, record: &BalanceRecord) {
        self.quantities.accumulate(&record.quantities);
        self.balance_quantity = self.quantities.total();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn record() -> BalanceRecord {
        BalanceRecord::zero(BalanceKey::new("M1", "L1"))
    }

    #[test]
    fn test_apply_delta_updates_total() {
        let mut r = record();
        r.apply_delta(Bucket::Unrestricted, dec!(100), DeltaPolicy::Strict)
            .unwrap();
        r.apply_delta(Bucket::Blocked, dec!(5), DeltaPolicy::Strict)
            .unwrap();
        assert_eq!(r.balance_quantity, dec!(105));
        assert!(r.is_consistent());
    }

    #[test]
    fn test_apply_delta_rejects_underflow() {
        let mut r = record();
        r.apply_delta(Bucket::Unrestricted, dec!(10), DeltaPolicy::Strict)
            .unwrap();
        let before = r.clone();
        let err = r
            .apply_delta(Bucket::Unrestricted, dec!(-11), DeltaPolicy::Strict)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { requested, available, .. }
                if requested == dec!(11) && available == dec!(10)
        ));
        assert_eq!(r, before);
    }

    #[test]
    fn test_administrative_correction_may_go_negative() {
        let mut r = record();
        r.apply_delta(
            Bucket::Unrestricted,
            dec!(-3),
            DeltaPolicy::AdministrativeCorrection,
        )
        .unwrap();
        assert_eq!(r.get(Bucket::Unrestricted), dec!(-3));
        assert!(r.is_consistent());
    }

    #[test]
    fn test_strict_receipt_into_negative_bucket() {
        let mut r = record();
        r.apply_delta(
            Bucket::Unrestricted,
            dec!(-3),
            DeltaPolicy::AdministrativeCorrection,
        )
        .unwrap();
        r.apply_delta(Bucket::Unrestricted, dec!(1), DeltaPolicy::Strict)
            .unwrap();
        assert_eq!(r.get(Bucket::Unrestricted), dec!(-2));
        assert_eq!(r.balance_quantity, dec!(-2));

        // Further decrements are still refused.
        assert!(r
            .apply_delta(Bucket::Unrestricted, dec!(-1), DeltaPolicy::Strict)
            .is_err());
    }

    #[test]
    fn test_move_bucket_keeps_total() {
        let mut r = record();
        r.apply_delta(Bucket::QualityInspection, dec!(40), DeltaPolicy::Strict)
            .unwrap();
        r.move_bucket(Bucket::QualityInspection, Bucket::Unrestricted, dec!(25))
            .unwrap();
        assert_eq!(r.get(Bucket::QualityInspection), dec!(15));
        assert_eq!(r.get(Bucket::Unrestricted), dec!(25));
        assert_eq!(r.balance_quantity, dec!(40));
    }

    #[test]
    fn test_move_bucket_rejects_excess() {
        let mut r = record();
        r.apply_delta(Bucket::QualityInspection, dec!(10), DeltaPolicy::Strict)
            .unwrap();
        assert!(r
            .move_bucket(Bucket::QualityInspection, Bucket::Unrestricted, dec!(11))
            .is_err());
        assert!(r
            .move_bucket(Bucket::QualityInspection, Bucket::Unrestricted, dec!(0))
            .is_err());
    }

    #[test]
    fn test_plant_absorb() {
        let mut a = record();
        a.apply_delta(Bucket::Unrestricted, dec!(7), DeltaPolicy::Strict)
            .unwrap();
        let mut b = BalanceRecord::zero(BalanceKey::new("M1", "L2").with_batch("B1"));
        b.apply_delta(Bucket::Reserved, dec!(3), DeltaPolicy::Strict)
            .unwrap();

        let mut plant = PlantStockBalance::zero("M1", "P1");
        plant.absorb(&a);
        plant.absorb(&b);
        assert_eq!(plant.quantities.unrestricted_qty, dec!(7));
        assert_eq!(plant.quantities.reserved_qty, dec!(3));
        assert_eq!(plant.balance_quantity, dec!(10));
    }

    #[test]
    fn test_serde_uses_storage_names() {
        let mut r = BalanceRecord::zero(BalanceKey::new("M1", "L1").with_batch("B1"));
        r.apply_delta(Bucket::Unrestricted, dec!(2), DeltaPolicy::Strict)
            .unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["material_id"], "M1");
        assert_eq!(json["batch_id"], "B1");
        assert!(json.get("unrestricted_qty").is_some());
        assert!(json.get("balance_quantity").is_some());
    }
}
