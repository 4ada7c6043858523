//! Property-based tests for balance rows.
//!
//! Run with: cargo test -p stockledger-core --test `property_tests`

use proptest::prelude::*;
use rust_decimal::Decimal;
use stockledger_core::{
    BalanceKey, BalanceRecord, Bucket, DeltaPolicy, LedgerError, PendingAllocation,
    AllocationLine,
};

// ============================================================================
// Arbitrary generators
// ============================================================================

fn arb_bucket() -> impl Strategy<Value = Bucket> {
    prop_oneof![
        Just(Bucket::Blocked),
        Just(Bucket::Reserved),
        Just(Bucket::Unrestricted),
        Just(Bucket::QualityInspection),
        Just(Bucket::InTransit),
    ]
}

fn arb_delta() -> impl Strategy<Value = Decimal> {
    (-50_000i64..100_000i64).prop_map(|n| Decimal::new(n, 3))
}

fn arb_location() -> impl Strategy<Value = String> {
    prop_oneof![Just("L1".to_string()), Just("L2".to_string()), Just("L3".to_string())]
}

fn arb_allocation() -> impl Strategy<Value = PendingAllocation> {
    prop::collection::vec((arb_location(), 0i64..10_000i64), 0..6).prop_map(|lines| {
        lines
            .into_iter()
            .map(|(loc, n)| AllocationLine::new(loc, Decimal::new(n, 2)))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The total always equals the bucket sum, and accepted deltas add up.
    #[test]
    fn prop_conservation(ops in prop::collection::vec((arb_bucket(), arb_delta()), 0..40)) {
        let mut row = BalanceRecord::zero(BalanceKey::new("M1", "L1"));
        let mut applied = Decimal::ZERO;
        for (bucket, delta) in ops {
            if row.apply_delta(bucket, delta, DeltaPolicy::Strict).is_ok() {
                applied += delta;
            }
            prop_assert!(row.is_consistent());
        }
        prop_assert_eq!(row.balance_quantity, applied);
    }

    /// Strict deltas never leave a bucket negative; rejections leave the row unchanged.
    #[test]
    fn prop_non_negative(ops in prop::collection::vec((arb_bucket(), arb_delta()), 0..40)) {
        let mut row = BalanceRecord::zero(BalanceKey::new("M1", "L1"));
        for (bucket, delta) in ops {
            let before = row.clone();
            match row.apply_delta(bucket, delta, DeltaPolicy::Strict) {
                Ok(()) => {}
                Err(LedgerError::InsufficientBalance { .. }) => prop_assert_eq!(&row, &before),
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
            prop_assert!(!row.quantities.has_negative());
        }
    }

    /// Moving between buckets never changes the total.
    #[test]
    fn prop_move_keeps_total(
        seed in (1i64..100_000i64).prop_map(|n| Decimal::new(n, 3)),
        moves in prop::collection::vec((arb_bucket(), arb_bucket(), arb_delta()), 0..20),
    ) {
        let mut row = BalanceRecord::zero(BalanceKey::new("M1", "L1"));
        row.apply_delta(Bucket::QualityInspection, seed, DeltaPolicy::Strict).unwrap();
        for (from, to, qty) in moves {
            let _ = row.move_bucket(from, to, qty);
            prop_assert_eq!(row.balance_quantity, seed);
            prop_assert!(!row.quantities.has_negative());
        }
    }

    /// Applying `next.diff(prev)` on top of `prev` yields `next` per slot.
    #[test]
    fn prop_diff_reconstructs(prev in arb_allocation(), next in arb_allocation()) {
        let mut rebuilt = prev.per_slot();
        for (slot, delta) in next.diff(&prev) {
            *rebuilt.entry(slot).or_insert(Decimal::ZERO) += delta;
        }
        rebuilt.retain(|_, q| !q.is_zero());
        let mut expected = next.per_slot();
        expected.retain(|_, q| !q.is_zero());
        prop_assert_eq!(rebuilt, expected);
    }
}
