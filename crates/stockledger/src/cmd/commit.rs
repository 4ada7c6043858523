//! `stockledger commit`: validate or commit a document file.
//!
//! The file holds one [`Document`] as JSON. With `--write-back` the
//! committed document (line statuses and committed allocations) replaces
//! the file, so a later edit of the same document only applies the
//! difference.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use serde_json::{json, Value};
use stockledger_movement::{Document, LineCheck, ValidationReport};

use super::{print_report, rejected, OutputFormat, Outcome, Session};

/// Commit a document.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Document file (JSON)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Only validate; nothing is written
    #[arg(long)]
    pub check: bool,

    /// Write the committed document back to the file
    #[arg(long, conflicts_with = "check")]
    pub write_back: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

fn read_document(path: &Path) -> Result<Document> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing document {}", path.display()))
}

fn validation_json(report: &ValidationReport) -> Value {
    let lines: Vec<Value> = report
        .lines
        .iter()
        .map(|line| match &line.check {
            LineCheck::Passed => json!({ "line_no": line.line_no, "status": "ok" }),
            LineCheck::Degraded(why) => {
                json!({ "line_no": line.line_no, "status": "degraded", "reason": why })
            }
            LineCheck::Rejected(err) => json!({
                "line_no": line.line_no,
                "status": "rejected",
                "code": err.code().to_string(),
                "message": err.to_string(),
            }),
        })
        .collect();
    json!({
        "document_id": report.document_id,
        "ok": report.is_ok(),
        "lines": lines,
    })
}

/// Run the commit command.
pub fn run(args: &Args, session: &Session, out: &mut dyn Write) -> Result<Outcome> {
    let mut document = read_document(&args.file)?;

    if args.check {
        let report = match session.ledger.validate(&document) {
            Ok(report) => report,
            Err(err) => return Ok(rejected(&err)),
        };
        if args.format == OutputFormat::Json {
            serde_json::to_writer_pretty(&mut *out, &validation_json(&report))?;
            writeln!(out)?;
        } else {
            write!(out, "{report}")?;
        }
        return Ok(if report.is_ok() {
            Outcome::Done
        } else {
            Outcome::Rejected
        });
    }

    let result = session.ledger.commit(&mut document);
    let outcome = session.finish(result, out, |out, report| {
        print_report(out, report, args.format)
    })?;
    if outcome == Outcome::Done && args.write_back {
        let text = serde_json::to_string_pretty(&document)?;
        fs::write(&args.file, text)
            .with_context(|| format!("writing {}", args.file.display()))?;
    }
    Ok(outcome)
}
