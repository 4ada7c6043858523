//! `stockledger receive`: book a goods receipt into one balance row.

use anyhow::Result;
use rust_decimal::Decimal;
use std::io::Write;
use stockledger_core::Bucket;
use stockledger_movement::ReceiptRequest;

use super::{print_report, KeyArgs, OutputFormat, Outcome, Session};

/// Receive stock.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Balance row
    #[command(flatten)]
    pub key: KeyArgs,

    /// Quantity received
    pub quantity: Decimal,

    /// Unit cost (required for FIFO and weighted-average items)
    #[arg(long)]
    pub cost: Option<Decimal>,

    /// Bucket credited (`UNR`, `QIP`, `BLK`, ...)
    #[arg(long, default_value = "UNR")]
    pub bucket: Bucket,

    /// Batch number for the lot created by a batch-tracked receipt
    #[arg(long)]
    pub batch_number: Option<String>,

    /// Receiving reference
    #[arg(long, default_value = "adhoc")]
    pub reference: String,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

/// Run the receive command.
pub fn run(args: &Args, session: &Session, out: &mut dyn Write) -> Result<Outcome> {
    let mut request = ReceiptRequest::new(args.key.key(), args.quantity)
        .with_bucket(args.bucket)
        .with_reference(&args.reference);
    if let Some(cost) = args.cost {
        request = request.with_unit_cost(cost);
    }
    if let Some(number) = &args.batch_number {
        request = request.with_batch_number(number);
    }
    let result = session.ledger.apply_receipt(request);
    session.finish(result, out, |out, report| {
        print_report(out, report, args.format)
    })
}
