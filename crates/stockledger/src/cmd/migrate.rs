//! `stockledger migrate`: convert an item's costing ledger to another
//! method.
//!
//! Only the costing records change. The item's `costing_method` in the
//! configuration file still names the old method afterwards and has to be
//! edited by hand, otherwise later movements keep booking against the
//! records that were just deleted.

use anyhow::Result;
use std::io::{self, Write};
use stockledger_core::CostingScope;
use stockledger_costing::{MigrationAction, MigrationPlan};

use super::{rejected, Cli, OutputFormat, Outcome, Session};

/// Migrate a costing ledger.
#[derive(clap::Args, Debug)]
pub struct Args {
    /// Item
    #[arg(value_name = "MATERIAL")]
    pub material: String,

    /// Target method (`FIFO` or `Weighted Average`)
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Plant of the costing scope
    #[arg(long)]
    pub plant: Option<String>,

    /// Organization of the costing scope
    #[arg(long)]
    pub org: Option<String>,

    /// Show the plan without applying it
    #[arg(long)]
    pub dry_run: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl Args {
    fn scope(&self) -> CostingScope {
        let mut scope = CostingScope::item(&self.material);
        scope.plant_id.clone_from(&self.plant);
        scope.organization_id.clone_from(&self.org);
        scope
    }
}

fn print_plan(out: &mut dyn Write, plan: &MigrationPlan, format: OutputFormat) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer_pretty(&mut *out, plan)?;
        return writeln!(out);
    }
    writeln!(out, "{} -> {}", plan.scope, plan.target)?;
    match &plan.action {
        MigrationAction::AddAverage {
            wa_quantity,
            wa_cost_price,
        } => writeln!(out, "  add average {wa_quantity} @ {wa_cost_price}")?,
        MigrationAction::UpdateAverage {
            id,
            wa_quantity,
            wa_cost_price,
        } => writeln!(out, "  update average {id} to {wa_quantity} @ {wa_cost_price}")?,
        MigrationAction::AddLayer {
            fifo_sequence,
            fifo_cost_price,
            fifo_quantity,
        } => writeln!(
            out,
            "  add layer #{fifo_sequence} {fifo_quantity} @ {fifo_cost_price}"
        )?,
    }
    if !plan.ids_to_delete.is_empty() {
        let ids: Vec<String> = plan.ids_to_delete.iter().map(ToString::to_string).collect();
        writeln!(out, "  delete {}", ids.join(", "))?;
    }
    Ok(())
}

/// Run the migrate command.
pub fn run(args: &Args, session: &Session, cli: &Cli, out: &mut dyn Write) -> Result<Outcome> {
    let scope = args.scope();

    if args.dry_run {
        return match session.ledger.preview_migration(&scope, &args.target) {
            Ok(plan) => {
                print_plan(out, &plan, args.format)?;
                Ok(Outcome::Done)
            }
            Err(err) => Ok(rejected(&err)),
        };
    }

    let result = session.ledger.migrate_costing(&scope, &args.target);
    let outcome = session.finish(result, out, |out, plan| {
        print_plan(out, plan, args.format)
    })?;
    if outcome == Outcome::Done {
        eprintln!(
            "note: set costing_method of {} to \"{}\" in {}",
            args.material,
            args.target,
            cli.config.display()
        );
    }
    Ok(outcome)
}
