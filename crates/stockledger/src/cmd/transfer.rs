//! `stockledger transfer`: move stock between buckets, optionally to
//! another location.

use anyhow::Result;
use rust_decimal::Decimal;
use std::io::Write;
use stockledger_core::Bucket;
use stockledger_movement::TransferRequest;

use super::{print_report, KeyArgs, OutputFormat, Outcome, Session};

/// Transfer stock.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Balance row
    #[command(flatten)]
    pub key: KeyArgs,

    /// Quantity moved
    pub quantity: Decimal,

    /// Source bucket
    #[arg(long, default_value = "UNR")]
    pub from: Bucket,

    /// Destination bucket
    #[arg(long)]
    pub to: Bucket,

    /// Destination location
    #[arg(long)]
    pub to_location: Option<String>,

    /// Movement reference
    #[arg(long, default_value = "adhoc")]
    pub reference: String,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Run the transfer command.
pub fn run(args: &Args, session: &Session, out: &mut dyn Write) -> Result<Outcome> {
    let mut request = TransferRequest::new(args.key.key(), args.from, args.to, args.quantity)
        .with_reference(&args.reference);
    if let Some(location) = &args.to_location {
        request = request.with_target_location(location);
    }
    let result = session.ledger.transfer_bucket(request);
    session.finish(result, out, |out, report| {
        print_report(out, report, args.format)
    })
}
