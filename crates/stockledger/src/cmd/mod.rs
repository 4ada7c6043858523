//! Command implementations for the `stockledger` binary.
//!
//! Every subcommand opens a [`Session`] (configuration, item master and the
//! state snapshot), does its work through the ledger facade and, if it
//! changed anything, writes the snapshot back.
//!
//! Exit codes: `0` success, `1` the ledger rejected the request, `2` usage,
//! configuration or IO failure.

pub mod commit;
pub mod issue;
pub mod migrate;
pub mod rebuild;
pub mod receive;
pub mod show;
pub mod transfer;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use stockledger_core::{BalanceKey, LedgerError};
use stockledger_movement::{CommitReport, StockLedger};
use stockledger_store::{snapshot, MemoryStore};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::LedgerConfig;

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON output for tooling
    Json,
}

/// Inventory balance and costing ledger.
#[derive(Parser, Debug)]
#[command(name = "stockledger", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file with the item master and processor options
    #[arg(long, short = 'c', global = true, default_value = "stockledger.json")]
    pub config: PathBuf,

    /// State snapshot to use instead of the configured one
    #[arg(long, global = true, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Show debug logs (otherwise `RUST_LOG` applies)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Receive stock into one balance row
    Receive(receive::Args),
    /// Issue stock from one balance row
    Issue(issue::Args),
    /// Move stock between buckets or locations
    Transfer(transfer::Args),
    /// Commit or validate a document file
    Commit(commit::Args),
    /// Switch an item's costing ledger to another method
    Migrate(migrate::Args),
    /// Recompute plant aggregates
    Rebuild(rebuild::Args),
    /// Show the balances and costing state of an item
    Show(show::Args),
}

/// How a command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The request was applied (or only read).
    Done,
    /// The ledger refused the request.
    Rejected,
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Done => Self::SUCCESS,
            Outcome::Rejected => Self::from(1),
        }
    }
}

/// Balance key arguments shared by the single-row commands.
#[derive(clap::Args, Debug, Clone)]
pub struct KeyArgs {
    /// Item
    #[arg(value_name = "MATERIAL")]
    pub material: String,

    /// Storage location
    #[arg(long, short = 'l')]
    pub location: String,

    /// Batch id
    #[arg(long)]
    pub batch: Option<String>,

    /// Serial number
    #[arg(long)]
    pub serial: Option<String>,

    /// Plant
    #[arg(long)]
    pub plant: Option<String>,

    /// Organization
    #[arg(long)]
    pub org: Option<String>,
}

impl KeyArgs {
    /// The balance key these arguments name.
    #[must_use]
    pub fn key(&self) -> BalanceKey {
        let mut key = BalanceKey::new(&self.material, &self.location);
        key.batch_id.clone_from(&self.batch);
        key.serial_number.clone_from(&self.serial);
        key.plant_id.clone_from(&self.plant);
        key.organization_id.clone_from(&self.org);
        key
    }
}

/// Configuration, item master and ledger state for one command.
pub struct Session {
    /// Loaded configuration.
    pub config: LedgerConfig,
    /// Where the state snapshot lives.
    pub state_path: PathBuf,
    /// The ledger over the loaded state.
    pub ledger: StockLedger<MemoryStore>,
}

impl Session {
    /// Load configuration and state.
    pub fn open(cli: &Cli) -> Result<Self> {
        let config = LedgerConfig::load(&cli.config)?;
        let items = config.item_master()?;
        let state_path = cli
            .state
            .clone()
            .unwrap_or_else(|| config.state_file.clone());
        let store = snapshot::load(&state_path)?;
        debug!(
            target: "stockledger::cli",
            config = %cli.config.display(),
            state = %state_path.display(),
            items = config.items.len(),
            "session opened"
        );
        let ledger = StockLedger::new(store, items).with_options(config.processor.clone());
        Ok(Self {
            config,
            state_path,
            ledger,
        })
    }

    /// Write the state back.
    pub fn save(&self) -> Result<()> {
        snapshot::save(self.ledger.store(), &self.state_path)
            .with_context(|| format!("saving state to {}", self.state_path.display()))
    }

    /// Save after a successful change; report a rejection.
    pub fn finish<T>(
        &self,
        result: Result<T, LedgerError>,
        out: &mut dyn Write,
        print: impl FnOnce(&mut dyn Write, &T) -> io::Result<()>,
    ) -> Result<Outcome> {
        match result {
            Ok(value) => {
                self.save()?;
                print(out, &value)?;
                Ok(Outcome::Done)
            }
            Err(err) => Ok(rejected(&err)),
        }
    }
}

/// Report a ledger rejection on stderr.
pub fn rejected(err: &LedgerError) -> Outcome {
    eprintln!("error[{}]: {err}", err.code());
    if let LedgerError::CompensationFailed { failures, .. } = err {
        for failure in failures {
            eprintln!("  not reversed: {failure}");
        }
    }
    Outcome::Rejected
}

/// Print a commit report.
pub fn print_report(
    out: &mut dyn Write,
    report: &CommitReport,
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, report)?;
        return writeln!(out);
    }
    writeln!(out, "{}: committed", report.document_id)?;
    for line in &report.lines {
        write!(
            out,
            "  line {} {} net {}",
            line.line_no, line.material_id, line.net_quantity
        )?;
        if let Some(cost) = line.cost_value {
            write!(out, " cost {cost}")?;
        }
        if let Some(batch) = &line.batch_id {
            write!(out, " batch {batch}")?;
        }
        if let Some(why) = &line.degraded {
            write!(out, " (allocation ignored: {why})")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Run a parsed command line, writing results to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<Outcome> {
    let session = Session::open(cli)?;
    match &cli.command {
        Command::Receive(args) => receive::run(args, &session, out),
        Command::Issue(args) => issue::run(args, &session, out),
        Command::Transfer(args) => transfer::run(args, &session, out),
        Command::Commit(args) => commit::run(args, &session, out),
        Command::Migrate(args) => migrate::run(args, &session, cli, out),
        Command::Rebuild(args) => rebuild::run(args, &session, out),
        Command::Show(args) => show::run(args, &session, out),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("stockledger=debug")
    } else {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => return,
        }
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Main entry point.
pub fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut stdout = io::stdout().lock();
    match run(&cli, &mut stdout) {
        Ok(outcome) => outcome.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
