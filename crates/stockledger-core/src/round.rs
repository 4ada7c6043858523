//! Rounding rules for quantities and costs.
//!
//! Quantities carry 3 decimal places and costs 4. Values are rounded half away
//! from zero before they enter costing arithmetic so that repeated migrations
//! do not accumulate drift.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on quantities.
pub const QTY_SCALE: u32 = 3;

/// Decimal places kept on unit costs.
pub const COST_SCALE: u32 = 4;

/// Round a quantity to [`QTY_SCALE`] places.
#[must_use]
pub fn round_qty(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(QTY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Round a unit cost to [`COST_SCALE`] places.
#[must_use]
pub fn round_cost(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(COST_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
