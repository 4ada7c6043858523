//! `stockledger show`: balances, plant aggregates, costing records and
//! batches of one item.

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::{self, Write};
use stockledger_core::{BalanceRecord, Batch, Bucket, PlantStockBalance};
use stockledger_store::{BalanceStore, BatchStore, CostingState, CostingStore, PlantBalanceStore};

use super::{OutputFormat, Outcome, Session};

/// Show an item.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Item
    #[arg(value_name = "MATERIAL")]
    pub material: String,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Everything stored for one item.
#[derive(Debug, Serialize)]
pub struct ItemView {
    /// Item.
    pub material_id: String,
    /// Balance rows.
    pub balances: Vec<BalanceRecord>,
    /// Plant aggregates.
    pub plants: Vec<PlantStockBalance>,
    /// Costing ledgers of the item's scopes.
    pub costing: Vec<CostingState>,
    /// Current unit cost, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
    /// Receipt lots.
    pub batches: Vec<Batch>,
}

impl ItemView {
    /// Gather the stored state of `material_id`.
    pub fn load(session: &Session, material_id: &str) -> Result<Self> {
        let store = session.ledger.store();
        let mut costing = Vec::new();
        for scope in store.costing_scopes()? {
            if scope.material_id == material_id {
                costing.push(store.load_costing(&scope)?);
            }
        }
        let unit_cost = match costing.first() {
            Some(state) => session.ledger.unit_cost(&state.scope).ok().flatten(),
            None => None,
        };
        Ok(Self {
            material_id: material_id.to_string(),
            balances: store.balances_for_item(material_id)?,
            plants: store.plant_balances_for_item(material_id)?,
            costing,
            unit_cost,
            batches: store.batches_for_item(material_id)?,
        })
    }

    fn write_text(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "{}", self.material_id)?;
        if self.balances.is_empty() {
            writeln!(out, "  no balances")?;
        }
        for record in &self.balances {
            write!(out, "  {} total {}", record.key, record.balance_quantity)?;
            for bucket in Bucket::ALL {
                let qty = record.get(bucket);
                if !qty.is_zero() {
                    write!(out, " {bucket} {qty}")?;
                }
            }
            writeln!(out)?;
        }
        for plant in &self.plants {
            writeln!(out, "  plant {} total {}", plant.plant_id, plant.balance_quantity)?;
        }
        for state in &self.costing {
            writeln!(out, "  costing {}", state.scope)?;
            let mut layers: Vec<_> = state.layers.iter().collect();
            layers.sort_by_key(|layer| layer.fifo_sequence);
            for layer in layers {
                writeln!(
                    out,
                    "    layer #{} {} of {} @ {}",
                    layer.fifo_sequence,
                    layer.fifo_available_quantity,
                    layer.fifo_initial_quantity,
                    layer.fifo_cost_price
                )?;
            }
            if let Some(average) = state.latest_average() {
                writeln!(
                    out,
                    "    average {} @ {}",
                    average.wa_quantity, average.wa_cost_price
                )?;
            }
        }
        if let Some(cost) = self.unit_cost {
            writeln!(out, "  unit cost {cost}")?;
        }
        for batch in &self.batches {
            writeln!(
                out,
                "  batch {} ({}) received {}",
                batch.id, batch.batch_number, batch.initial_quantity
            )?;
        }
        Ok(())
    }
}

/// Run the show command.
pub fn run(args: &Args, session: &Session, out: &mut dyn Write) -> Result<Outcome> {
    let view = ItemView::load(session, &args.material)?;
    if args.format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, &view)?;
        writeln!(out)?;
    } else {
        view.write_text(out)?;
    }
    Ok(Outcome::Done)
}
