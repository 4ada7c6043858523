//! Moving weighted-average costing.
//!
//! A receipt blends into the record with
//! `new_cost = (old_qty * old_cost + in_qty * in_cost) / (old_qty + in_qty)`;
//! a consumption lowers the quantity and leaves the cost alone.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use stockledger_core::{
    round_cost, round_qty, CostingMethod, LedgerError, LedgerResult, RecordId,
    WeightedAverageRecord,
};
use stockledger_store::CostingState;

use crate::{Consumption, PriorAverage, Receipt};

/// `(old_qty * old_cost + in_qty * in_cost) / (old_qty + in_qty)`, rounded.
///
/// When the combined quantity is zero the incoming cost is returned.
#[must_use]
pub fn blend(old_qty: Decimal, old_cost: Decimal, in_qty: Decimal, in_cost: Decimal) -> Decimal {
    let total = old_qty + in_qty;
    if total <= Decimal::ZERO {
        return round_cost(in_cost);
    }
    round_cost((old_qty * old_cost + in_qty * in_cost) / total)
}

/// Blend a receipt into the latest record, creating one if there is none.
///
/// `new_id` is called only when a record has to be created.
pub fn receive(
    state: &mut CostingState,
    quantity: Decimal,
    cost_price: Decimal,
    new_id: impl FnOnce() -> RecordId,
    created_at: NaiveDateTime,
) -> LedgerResult<WeightedAverageRecord> {
    let quantity = round_qty(quantity);
    let cost_price = round_cost(cost_price);
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid_quantity(
            quantity,
            "receipt quantity must be positive",
        ));
    }
    if cost_price < Decimal::ZERO {
        return Err(LedgerError::invalid_quantity(
            cost_price,
            "cost price must not be negative",
        ));
    }

    if let Some(record) = state.latest_average_mut() {
        record.wa_cost_price = blend(record.wa_quantity, record.wa_cost_price, quantity, cost_price);
        record.wa_quantity += quantity;
        return Ok(record.clone());
    }

    let record = WeightedAverageRecord {
        id: new_id(),
        material_id: state.scope.material_id.clone(),
        plant_id: state.scope.plant_id.clone(),
        wa_quantity: quantity,
        wa_cost_price: cost_price,
        created_at,
    };
    state.averages.push(record.clone());
    Ok(record)
}

/// Take `quantity` out of the latest record at its current cost.
pub fn consume(state: &mut CostingState, quantity: Decimal) -> LedgerResult<Consumption> {
    let quantity = round_qty(quantity);
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid_quantity(
            quantity,
            "consumption quantity must be positive",
        ));
    }
    let key = state.scope.to_string();
    let Some(record) = state.latest_average_mut() else {
        return Err(LedgerError::InsufficientBalance {
            key,
            bucket: None,
            requested: quantity,
            available: Decimal::ZERO,
        });
    };
    if quantity > record.wa_quantity {
        return Err(LedgerError::InsufficientBalance {
            key,
            bucket: None,
            requested: quantity,
            available: record.wa_quantity,
        });
    }
    record.wa_quantity -= quantity;
    Ok(Consumption {
        method: CostingMethod::WeightedAverage,
        quantity,
        uncovered: Decimal::ZERO,
        total_cost: quantity * record.wa_cost_price,
        draws: Vec::new(),
    })
}

/// Take what the latest record holds, up to `quantity`, and cost the whole
/// quantity at the record's cost (zero when there is no record).
pub fn consume_available(state: &mut CostingState, quantity: Decimal) -> LedgerResult<Consumption> {
    let quantity = round_qty(quantity);
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid_quantity(
            quantity,
            "consumption quantity must be positive",
        ));
    }
    let (drawn, cost) = match state.latest_average_mut() {
        Some(record) => {
            let drawn = quantity.min(record.wa_quantity).max(Decimal::ZERO);
            record.wa_quantity -= drawn;
            (drawn, record.wa_cost_price)
        }
        None => (Decimal::ZERO, Decimal::ZERO),
    };
    Ok(Consumption {
        method: CostingMethod::WeightedAverage,
        quantity,
        uncovered: quantity - drawn,
        total_cost: quantity * cost,
        draws: Vec::new(),
    })
}

/// Undo a consumption: the quantity returns at the current cost.
pub fn restore(state: &mut CostingState, quantity: Decimal) -> LedgerResult<()> {
    if quantity.is_zero() {
        return Ok(());
    }
    let key = state.scope.to_string();
    let record = state
        .latest_average_mut()
        .ok_or_else(|| LedgerError::MissingConfiguration(format!("weighted average for {key}")))?;
    record.wa_quantity += round_qty(quantity);
    Ok(())
}

/// Undo a receipt.
///
/// When the record is exactly as the receipt left it, the quantity and cost
/// captured before the receipt come back unchanged (and a record the receipt
/// created is removed). If other movements touched the record since, the
/// receipt's quantity is taken out and its value is backed out of the cost;
/// an emptied record falls back to the captured cost.
pub fn reverse_receipt(state: &mut CostingState, receipt: &Receipt) -> LedgerResult<()> {
    let quantity = round_qty(receipt.quantity);
    let key = state.scope.to_string();
    let index = state
        .averages
        .iter()
        .position(|r| r.id == receipt.record_id)
        .ok_or_else(|| LedgerError::MissingConfiguration(format!("weighted average for {key}")))?;
    let record = &mut state.averages[index];
    if quantity > record.wa_quantity {
        return Err(LedgerError::InsufficientBalance {
            key,
            bucket: None,
            requested: quantity,
            available: record.wa_quantity,
        });
    }

    let prior = receipt.prior_average;
    let (prior_qty, prior_cost) = prior.map_or((Decimal::ZERO, receipt.cost_price), |p| {
        (p.wa_quantity, p.wa_cost_price)
    });
    let untouched = record.wa_quantity == prior_qty + quantity
        && record.wa_cost_price == blend(prior_qty, prior_cost, quantity, receipt.cost_price);

    if untouched {
        match prior {
            Some(p) => {
                record.wa_quantity = p.wa_quantity;
                record.wa_cost_price = p.wa_cost_price;
            }
            None => {
                state.averages.remove(index);
            }
        }
        return Ok(());
    }

    let remaining = record.wa_quantity - quantity;
    if remaining > Decimal::ZERO {
        let value = record.wa_quantity * record.wa_cost_price - quantity * receipt.cost_price;
        record.wa_cost_price = round_cost(value / remaining).max(Decimal::ZERO);
    } else if let Some(p) = prior {
        record.wa_cost_price = p.wa_cost_price;
    }
    record.wa_quantity = remaining;
    Ok(())
}

/// Cost of the latest record.
#[must_use]
pub fn current_cost(state: &CostingState) -> Option<Decimal> {
    state.latest_average().map(|r| r.wa_cost_price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use stockledger_core::CostingScope;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    fn empty() -> CostingState {
        CostingState::empty(CostingScope::item("M1"))
    }

    #[test]
    fn test_receive_blends() {
        let mut state = empty();
        receive(&mut state, dec!(10), dec!(4), || RecordId(1), now()).unwrap();
        let record = receive(&mut state, dec!(30), dec!(8), || RecordId(2), now()).unwrap();
        assert_eq!(record.id, RecordId(1));
        assert_eq!(record.wa_quantity, dec!(40));
        assert_eq!(record.wa_cost_price, dec!(7));
        assert_eq!(state.averages.len(), 1);
    }

    #[test]
    fn test_consume_keeps_cost() {
        let mut state = empty();
        receive(&mut state, dec!(10), dec!(4), || RecordId(1), now()).unwrap();
        let used = consume(&mut state, dec!(4)).unwrap();
        assert_eq!(used.total_cost, dec!(16));
        let record = state.latest_average().unwrap();
        assert_eq!(record.wa_quantity, dec!(6));
        assert_eq!(record.wa_cost_price, dec!(4));
    }

    #[test]
    fn test_consume_insufficient() {
        let mut state = empty();
        assert!(matches!(
            consume(&mut state, dec!(1)),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        receive(&mut state, dec!(2), dec!(1), || RecordId(1), now()).unwrap();
        let before = state.clone();
        assert!(consume(&mut state, dec!(3)).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn test_consume_available_takes_what_is_held() {
        let mut state = empty();
        receive(&mut state, dec!(2), dec!(3), || RecordId(1), now()).unwrap();
        let used = consume_available(&mut state, dec!(5)).unwrap();
        assert_eq!(used.drawn(), dec!(2));
        assert_eq!(used.uncovered, dec!(3));
        assert_eq!(used.total_cost, dec!(15));
        assert_eq!(state.latest_average().unwrap().wa_quantity, Decimal::ZERO);

        restore(&mut state, used.drawn()).unwrap();
        assert_eq!(state.latest_average().unwrap().wa_quantity, dec!(2));
    }

    fn blended(state: &mut CostingState, quantity: Decimal, cost: Decimal) -> Receipt {
        let prior_average = state.latest_average().map(PriorAverage::of);
        let record = receive(state, quantity, cost, || RecordId(1), now()).unwrap();
        Receipt {
            method: CostingMethod::WeightedAverage,
            record_id: record.id,
            quantity,
            cost_price: cost,
            prior_average,
        }
    }

    #[test]
    fn test_reverse_receipt_restores_cost() {
        let mut state = empty();
        blended(&mut state, dec!(10), dec!(4));
        let before = state.clone();
        let receipt = blended(&mut state, dec!(30), dec!(8));
        reverse_receipt(&mut state, &receipt).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_reverse_receipt_is_exact_after_rounding() {
        let mut state = empty();
        blended(&mut state, dec!(1), dec!(1));
        let before = state.clone();
        let receipt = blended(&mut state, dec!(2), dec!(2));
        assert_eq!(state.latest_average().unwrap().wa_cost_price, dec!(1.6667));

        reverse_receipt(&mut state, &receipt).unwrap();
        assert_eq!(state, before);
        assert_eq!(state.latest_average().unwrap().wa_cost_price, dec!(1));
    }

    #[test]
    fn test_reverse_receipt_into_emptied_record() {
        let mut state = empty();
        blended(&mut state, dec!(3), dec!(5));
        consume(&mut state, dec!(3)).unwrap();
        let before = state.clone();
        let receipt = blended(&mut state, dec!(4), dec!(9));
        assert_eq!(state.latest_average().unwrap().wa_cost_price, dec!(9));

        reverse_receipt(&mut state, &receipt).unwrap();
        assert_eq!(state, before);
        let record = state.latest_average().unwrap();
        assert_eq!(record.wa_quantity, Decimal::ZERO);
        assert_eq!(record.wa_cost_price, dec!(5));
    }

    #[test]
    fn test_reverse_first_receipt_removes_record() {
        let mut state = empty();
        let receipt = blended(&mut state, dec!(6), dec!(2));
        reverse_receipt(&mut state, &receipt).unwrap();
        assert!(state.averages.is_empty());
    }

    #[test]
    fn test_reverse_receipt_after_later_consumption() {
        let mut state = empty();
        blended(&mut state, dec!(10), dec!(4));
        let receipt = blended(&mut state, dec!(30), dec!(8));
        consume(&mut state, dec!(5)).unwrap();

        // 35 @ 7 left; backing 30 @ 8 out leaves 5 units worth 5.
        reverse_receipt(&mut state, &receipt).unwrap();
        let record = state.latest_average().unwrap();
        assert_eq!(record.wa_quantity, dec!(5));
        assert_eq!(record.wa_cost_price, dec!(1));
    }

    #[test]
    fn test_blend_rounds_to_four_places() {
        assert_eq!(blend(dec!(3), dec!(1), dec!(0), dec!(0)), dec!(1));
        assert_eq!(blend(dec!(1), dec!(1), dec!(2), dec!(2)), dec!(1.6667));
        assert_eq!(blend(dec!(0), dec!(0), dec!(0), dec!(5)), dec!(5));
    }
}
