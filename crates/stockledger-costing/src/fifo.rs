//! FIFO cost layers.
//!
//! Layers are consumed strictly by ascending `fifo_sequence`, regardless of
//! which physical batch a delivery touches. These functions operate on a
//! loaded [`CostingState`]; persistence is the caller's concern.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stockledger_core::{
    round_cost, round_qty, CostingMethod, FifoLayer, LedgerError, LedgerResult, RecordId,
};
use stockledger_store::CostingState;

use crate::Consumption;

/// Quantity taken from one layer by a consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDraw {
    /// Layer drawn from.
    pub layer_id: RecordId,
    /// Its sequence.
    pub fifo_sequence: u32,
    /// Quantity taken.
    pub quantity: Decimal,
    /// The layer's unit cost.
    pub cost_price: Decimal,
}

/// Append a layer at `max(sequence) + 1`.
pub fn add_layer(
    state: &mut CostingState,
    id: RecordId,
    batch_id: Option<String>,
    cost_price: Decimal,
    quantity: Decimal,
    created_at: NaiveDateTime,
) -> LedgerResult<FifoLayer> {
    let quantity = round_qty(quantity);
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid_quantity(
            quantity,
            "layer quantity must be positive",
        ));
    }
    if cost_price < Decimal::ZERO {
        return Err(LedgerError::invalid_quantity(
            cost_price,
            "cost price must not be negative",
        ));
    }
    let layer = FifoLayer {
        id,
        material_id: state.scope.material_id.clone(),
        batch_id,
        plant_id: state.scope.plant_id.clone(),
        fifo_sequence: state.max_sequence() + 1,
        fifo_cost_price: round_cost(cost_price),
        fifo_initial_quantity: quantity,
        fifo_available_quantity: quantity,
        created_at,
    };
    state.layers.push(layer.clone());
    Ok(layer)
}

/// Consume `quantity` from the lowest-sequence layers first.
///
/// Fails with `InsufficientLayerQuantity`, leaving every layer untouched,
/// when the layers together hold less than requested.
pub fn consume(state: &mut CostingState, quantity: Decimal) -> LedgerResult<Consumption> {
    let quantity = round_qty(quantity);
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid_quantity(
            quantity,
            "consumption quantity must be positive",
        ));
    }
    let available = state.fifo_available();
    if available < quantity {
        return Err(LedgerError::InsufficientLayerQuantity {
            material_id: state.scope.material_id.clone(),
            requested: quantity,
            available,
        });
    }

    Ok(draw(state, quantity))
}

/// Consume what the layers hold, up to `quantity`.
///
/// The shortfall is not drawn from any layer; it is costed at the newest
/// layer's cost, or zero when the scope never had a layer.
pub fn consume_available(state: &mut CostingState, quantity: Decimal) -> LedgerResult<Consumption> {
    let quantity = round_qty(quantity);
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid_quantity(
            quantity,
            "consumption quantity must be positive",
        ));
    }
    let newest_cost = state
        .layers
        .iter()
        .max_by_key(|l| l.fifo_sequence)
        .map_or(Decimal::ZERO, |l| l.fifo_cost_price);
    let drawn = quantity.min(state.fifo_available()).max(Decimal::ZERO);
    let mut used = draw(state, drawn);
    let uncovered = quantity - drawn;
    used.quantity = quantity;
    used.uncovered = uncovered;
    used.total_cost += uncovered * newest_cost;
    Ok(used)
}

fn draw(state: &mut CostingState, quantity: Decimal) -> Consumption {
    let mut order: Vec<usize> = (0..state.layers.len())
        .filter(|&i| !state.layers[i].is_exhausted())
        .collect();
    order.sort_by_key(|&i| state.layers[i].fifo_sequence);

    let mut remaining = quantity;
    let mut total_cost = Decimal::ZERO;
    let mut draws = Vec::new();
    for idx in order {
        if remaining.is_zero() {
            break;
        }
        let layer = &mut state.layers[idx];
        let take = remaining.min(layer.fifo_available_quantity);
        layer.fifo_available_quantity -= take;
        remaining -= take;
        total_cost += take * layer.fifo_cost_price;
        draws.push(LayerDraw {
            layer_id: layer.id,
            fifo_sequence: layer.fifo_sequence,
            quantity: take,
            cost_price: layer.fifo_cost_price,
        });
    }

    Consumption {
        method: CostingMethod::Fifo,
        quantity,
        uncovered: Decimal::ZERO,
        total_cost,
        draws,
    }
}

/// Put back what a consumption drew from each layer.
pub fn restore(state: &mut CostingState, draws: &[LayerDraw]) -> LedgerResult<()> {
    for draw in draws {
        let layer = find_layer(state, draw.layer_id)?;
        if layer.fifo_available_quantity + draw.quantity > layer.fifo_initial_quantity {
            return Err(LedgerError::invalid_quantity(
                draw.quantity,
                format!("restoring would overfill layer {}", draw.layer_id),
            ));
        }
    }
    for draw in draws {
        find_layer(state, draw.layer_id)?.fifo_available_quantity += draw.quantity;
    }
    Ok(())
}

/// Remove a layer created by a receipt that is being undone.
///
/// The layer must still hold its full initial quantity.
pub fn retract_layer(state: &mut CostingState, layer_id: RecordId) -> LedgerResult<()> {
    let layer = find_layer(state, layer_id)?;
    if layer.fifo_available_quantity != layer.fifo_initial_quantity {
        return Err(LedgerError::InsufficientLayerQuantity {
            material_id: layer.material_id.clone(),
            requested: layer.fifo_initial_quantity,
            available: layer.fifo_available_quantity,
        });
    }
    state.layers.retain(|l| l.id != layer_id);
    Ok(())
}

/// Cost of the oldest layer that still has quantity.
#[must_use]
pub fn current_cost(state: &CostingState) -> Option<Decimal> {
    state
        .layers
        .iter()
        .filter(|l| !l.is_exhausted())
        .min_by_key(|l| l.fifo_sequence)
        .map(|l| l.fifo_cost_price)
}

fn find_layer(state: &mut CostingState, layer_id: RecordId) -> LedgerResult<&mut FifoLayer> {
    state
        .layers
        .iter_mut()
        .find(|l| l.id == layer_id)
        .ok_or_else(|| LedgerError::MissingConfiguration(format!("FIFO layer {layer_id}")))
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

    fn state_with(layers: &[(Decimal, Decimal)]) -> CostingState {
        let mut state = CostingState::empty(CostingScope::item("M1"));
        for (i, (qty, cost)) in layers.iter().enumerate() {
            add_layer(&mut state, RecordId(i as u64 + 1), None, *cost, *qty, now()).unwrap();
        }
        state
    }

    #[test]
    fn test_first_layer_has_sequence_one() {
        let state = state_with(&[(dec!(100), dec!(10))]);
        assert_eq!(state.layers[0].fifo_sequence, 1);
        assert_eq!(state.layers[0].fifo_available_quantity, dec!(100));
    }

    #[test]
    fn test_consume_walks_sequence_order() {
        let mut state = state_with(&[(dec!(10), dec!(1)), (dec!(20), dec!(2)), (dec!(30), dec!(3))]);
        let used = consume(&mut state, dec!(30)).unwrap();
        assert_eq!(used.total_cost, dec!(50));
        assert_eq!(used.draws.len(), 2);
        assert!(state.layers[0].is_exhausted());
        assert!(state.layers[1].is_exhausted());
        assert_eq!(state.layers[2].fifo_available_quantity, dec!(30));
    }

    #[test]
    fn test_consume_available_costs_shortfall_at_newest_layer() {
        let mut state = state_with(&[(dec!(1), dec!(2)), (dec!(1), dec!(5))]);
        state.layers[1].fifo_available_quantity = Decimal::ZERO;
        let used = consume_available(&mut state, dec!(3)).unwrap();
        assert_eq!(used.quantity, dec!(3));
        assert_eq!(used.uncovered, dec!(2));
        assert_eq!(used.drawn(), dec!(1));
        assert_eq!(used.total_cost, dec!(12));
        assert_eq!(used.draws.len(), 1);
        assert_eq!(state.fifo_available(), Decimal::ZERO);

        restore(&mut state, &used.draws).unwrap();
        assert_eq!(state.layers[0].fifo_available_quantity, dec!(1));
    }

    #[test]
    fn test_consume_available_without_layers() {
        let mut state = state_with(&[]);
        let used = consume_available(&mut state, dec!(4)).unwrap();
        assert_eq!(used.uncovered, dec!(4));
        assert_eq!(used.total_cost, Decimal::ZERO);
        assert!(used.draws.is_empty());
    }

    #[test]
    fn test_consume_ignores_insertion_order() {
        let mut state = state_with(&[(dec!(10), dec!(1)), (dec!(10), dec!(2))]);
        state.layers.reverse();
        let used = consume(&mut state, dec!(5)).unwrap();
        assert_eq!(used.draws[0].fifo_sequence, 1);
        assert_eq!(used.total_cost, dec!(5));
    }

    #[test]
    fn test_consume_insufficient_leaves_state() {
        let mut state = state_with(&[(dec!(10), dec!(1))]);
        let before = state.clone();
        let err = consume(&mut state, dec!(11)).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientLayerQuantity { available, .. } if available == dec!(10)
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn test_restore_undoes_consume() {
        let mut state = state_with(&[(dec!(10), dec!(1)), (dec!(10), dec!(2))]);
        let before = state.clone();
        let used = consume(&mut state, dec!(15)).unwrap();
        restore(&mut state, &used.draws).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_retract_untouched_layer() {
        let mut state = state_with(&[(dec!(10), dec!(1)), (dec!(5), dec!(2))]);
        retract_layer(&mut state, RecordId(2)).unwrap();
        assert_eq!(state.layers.len(), 1);

        consume(&mut state, dec!(1)).unwrap();
        assert!(retract_layer(&mut state, RecordId(1)).is_err());
    }

    #[test]
    fn test_current_cost_is_oldest_open_layer() {
        let mut state = state_with(&[(dec!(10), dec!(1)), (dec!(10), dec!(2))]);
        assert_eq!(current_cost(&state), Some(dec!(1)));
        consume(&mut state, dec!(10)).unwrap();
        assert_eq!(current_cost(&state), Some(dec!(2)));
    }

    #[test]
    fn test_rejects_non_positive() {
        let mut state = state_with(&[]);
        assert!(add_layer(&mut state, RecordId(1), None, dec!(1), dec!(0), now()).is_err());
        assert!(add_layer(&mut state, RecordId(1), None, dec!(-1), dec!(1), now()).is_err());
        assert!(consume(&mut state, dec!(0)).is_err());
    }
}
