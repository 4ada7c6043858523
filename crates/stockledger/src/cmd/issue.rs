//! `stockledger issue`: consume stock from one balance row.

use anyhow::Result;
use rust_decimal::Decimal;
use std::io::Write;
use stockledger_core::Bucket;
use stockledger_movement::ConsumptionRequest;

use super::{print_report, KeyArgs, OutputFormat, Outcome, Session};

/// Issue stock.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Balance row
    #[command(flatten)]
    pub key: KeyArgs,

    /// Quantity issued
    pub quantity: Decimal,

    /// Bucket debited
    #[arg(long, default_value = "UNR")]
    pub bucket: Bucket,

    /// Issue reference
    #[arg(long, default_value = "adhoc")]
    pub reference: String,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Run the issue command.
pub fn run(args: &Args, session: &Session, out: &mut dyn Write) -> Result<Outcome> {
    let request = ConsumptionRequest::new(args.key.key(), args.quantity)
        .with_bucket(args.bucket)
        .with_reference(&args.reference);
    let result = session.ledger.apply_consumption(request);
    session.finish(result, out, |out, report| {
        print_report(out, report, args.format)
    })
}
