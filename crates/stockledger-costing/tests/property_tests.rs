//! Property-based tests for the costing ledger.
//!
//! Run with: cargo test -p stockledger-costing --test `property_tests`

use chrono::{NaiveDate, NaiveDateTime};
use proptest::prelude::*;
use rust_decimal::Decimal;
use stockledger_core::{CostingMethod, CostingScope, LedgerError, RecordId};
use stockledger_costing::{apply_plan, average, fifo, plan_migration};
use stockledger_store::CostingState;

// ============================================================================
// Arbitrary generators
// ============================================================================

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn arb_qty() -> impl Strategy<Value = Decimal> {
    (1i64..1_000_000i64).prop_map(|n| Decimal::new(n, 3))
}

fn arb_cost() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000i64).prop_map(|n| Decimal::new(n, 4))
}

fn arb_layers() -> impl Strategy<Value = Vec<(Decimal, Decimal)>> {
    prop::collection::vec((arb_qty(), arb_cost()), 1..12)
}

fn build(layers: &[(Decimal, Decimal)]) -> CostingState {
    let mut state = CostingState::empty(CostingScope::item("M1"));
    for (i, (qty, cost)) in layers.iter().enumerate() {
        fifo::add_layer(&mut state, RecordId(i as u64 + 1), None, *cost, *qty, now()).unwrap();
    }
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Consumption always exhausts lower sequences before touching higher ones.
    #[test]
    fn prop_fifo_ordering(layers in arb_layers(), pick in 0usize..1000) {
        let mut state = build(&layers);
        let total = state.fifo_available();
        let qty = (total * Decimal::from(pick % 1000 + 1) / Decimal::from(1000)).round_dp(3);
        prop_assume!(qty > Decimal::ZERO);
        fifo::consume(&mut state, qty).unwrap();

        let mut seen_partial = false;
        let mut sorted = state.layers.clone();
        sorted.sort_by_key(|l| l.fifo_sequence);
        for layer in &sorted {
            let touched = layer.fifo_available_quantity < layer.fifo_initial_quantity;
            if seen_partial {
                prop_assert!(!touched, "layer {} touched after a partial layer", layer.fifo_sequence);
            }
            if layer.fifo_available_quantity > Decimal::ZERO {
                seen_partial = true;
            }
        }
        prop_assert_eq!(state.fifo_available(), total - qty);
    }

    /// Consuming exactly the first two layers leaves every later layer untouched.
    #[test]
    fn prop_consume_first_two(layers in prop::collection::vec((arb_qty(), arb_cost()), 3..8)) {
        let mut state = build(&layers);
        let qty = layers[0].0 + layers[1].0;
        fifo::consume(&mut state, qty).unwrap();
        for layer in &state.layers {
            if layer.fifo_sequence <= 2 {
                prop_assert!(layer.is_exhausted());
            } else {
                prop_assert_eq!(layer.fifo_available_quantity, layer.fifo_initial_quantity);
            }
        }
    }

    /// No consumption ever drives a layer or the weighted average negative.
    #[test]
    fn prop_non_negative(
        receipts in prop::collection::vec((arb_qty(), arb_cost()), 0..10),
        takes in prop::collection::vec(arb_qty(), 0..10),
    ) {
        let mut layered = CostingState::empty(CostingScope::item("M1"));
        let mut averaged = CostingState::empty(CostingScope::item("M1"));
        for (i, (qty, cost)) in receipts.iter().enumerate() {
            fifo::add_layer(&mut layered, RecordId(i as u64 + 1), None, *cost, *qty, now()).unwrap();
            average::receive(&mut averaged, *qty, *cost, || RecordId(1), now()).unwrap();
        }
        for qty in takes {
            let before = layered.clone();
            match fifo::consume(&mut layered, qty) {
                Ok(_) => {}
                Err(LedgerError::InsufficientLayerQuantity { .. }) => prop_assert_eq!(&layered, &before),
                Err(other) => prop_assert!(false, "unexpected {other}"),
            }
            let before = averaged.clone();
            match average::consume(&mut averaged, qty) {
                Ok(_) => {}
                Err(LedgerError::InsufficientBalance { .. }) => prop_assert_eq!(&averaged, &before),
                Err(other) => prop_assert!(false, "unexpected {other}"),
            }
            prop_assert!(layered.layers.iter().all(|l| l.fifo_available_quantity >= Decimal::ZERO));
            prop_assert!(averaged.averages.iter().all(|r| r.wa_quantity >= Decimal::ZERO));
            prop_assert!(averaged.averages.iter().all(|r| r.wa_cost_price >= Decimal::ZERO));
        }
    }

    /// FIFO -> WA -> FIFO on a single layer gives back a single layer of the same quantity.
    #[test]
    fn prop_migration_round_trip(qty in arb_qty(), cost in arb_cost()) {
        let mut state = build(&[(qty, cost)]);

        let to_average = plan_migration(CostingMethod::WeightedAverage, &state).unwrap();
        apply_plan(&mut state, &to_average, RecordId(10), now()).unwrap();
        prop_assert!(state.layers.is_empty());

        let to_fifo = plan_migration(CostingMethod::Fifo, &state).unwrap();
        apply_plan(&mut state, &to_fifo, RecordId(11), now()).unwrap();

        prop_assert!(state.averages.is_empty());
        prop_assert_eq!(state.layers.len(), 1);
        let layer = &state.layers[0];
        prop_assert_eq!(layer.fifo_sequence, 1);
        prop_assert_eq!(layer.fifo_available_quantity, qty);
        prop_assert!((layer.fifo_cost_price - cost).abs() <= Decimal::new(1, 4));
    }

    /// Migration to weighted average conserves the open FIFO quantity.
    #[test]
    fn prop_migration_conserves_quantity(layers in arb_layers(), take in arb_qty()) {
        let mut state = build(&layers);
        let _ = fifo::consume(&mut state, take);
        let open = state.fifo_available();
        match plan_migration(CostingMethod::WeightedAverage, &state) {
            Ok(plan) => prop_assert_eq!(plan.quantity(), open),
            Err(LedgerError::NothingToMigrate { .. }) => prop_assert!(open.is_zero()),
            Err(other) => prop_assert!(false, "unexpected {other}"),
        }
    }
}
