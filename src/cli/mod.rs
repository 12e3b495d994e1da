// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap, hands the work to Layer 2 and
// prints the outcome. Two commands:
//   1. `predict` — run the full prediction job
//   2. `check`   — parse the input only, report bad rows
//
// Pipeline failures become anyhow errors here, so the process
// exits non-zero with "<stage> failed: <reason>".
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{CheckArgs, Commands, PredictArgs};

use crate::application::predict_use_case::DroppedRow;
use crate::infra::logging::LoggingConfig;

#[derive(Parser, Debug)]
#[command(
    name = "solubility-predict",
    version,
    about = "Predict aqueous solubility for molecules given as SMILES, using a trained graph model."
)]
pub struct Cli {
    /// tracing filter directive, e.g. `solubility_predict=debug`; RUST_LOG wins
    #[arg(long, global = true)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn logging(&self) -> LoggingConfig {
        self.log_filter
            .as_deref()
            .map(LoggingConfig::with_filter)
            .unwrap_or_default()
    }

    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Predict(args) => run_predict(args),
            Commands::Check(args)   => run_check(args),
        }
    }
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::PredictUseCase;

    tracing::info!("Predicting molecules from: {}", args.input.display());
    let outcome = match PredictUseCase::new(args.into()).execute() {
        Ok(outcome) => outcome,
        Err(failure) => {
            if let Some(table) = &failure.recovered {
                eprintln!("{} predicted rows were computed but could not be saved", table.len());
            }
            return Err(failure.into());
        }
    };

    let report = &outcome.report;
    print_dropped(&report.dropped);
    for skipped in &report.skipped {
        println!("  skipped row {} ({} atoms): {}", skipped.row, skipped.atoms, skipped.smiles);
    }
    println!(
        "Wrote {} predictions to {} ({} rows dropped, {} skipped)",
        outcome.written.rows,
        outcome.written.path.display(),
        report.dropped.len(),
        report.skipped.len()
    );
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<()> {
    use crate::application::check_use_case::CheckUseCase;

    let report = CheckUseCase::new(args.input, args.smiles_column).execute()?;
    print_dropped(&report.dropped);
    println!(
        "{} of {} rows parse; {} would be dropped",
        report.valid,
        report.input_rows,
        report.dropped.len()
    );
    Ok(())
}

fn print_dropped(dropped: &[DroppedRow]) {
    for d in dropped {
        println!("  dropped row {}: {}", d.row, d.failure);
    }
}
