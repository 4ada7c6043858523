//! `stockledger rebuild`: recompute plant aggregates from balance rows.

use anyhow::Result;
use std::io::Write;

use super::{OutputFormat, Outcome, Session};

/// Rebuild plant aggregates.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Item to rebuild; every item when omitted
    #[arg(value_name = "MATERIAL")]
    pub material: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Run the rebuild command.
pub fn run(args: &Args, session: &Session, out: &mut dyn Write) -> Result<Outcome> {
    let result = match &args.material {
        Some(material) => session.ledger.rebuild_plant_aggregate(material),
        None => session.ledger.rebuild_all_plant_aggregates(),
    };
    session.finish(result, out, |out, aggregates| {
        if args.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut *out, aggregates)?;
            return writeln!(out);
        }
        for aggregate in aggregates {
            writeln!(
                out,
                "{} {} {}",
                aggregate.material_id, aggregate.plant_id, aggregate.balance_quantity
            )?;
        }
        Ok(())
    })
}
