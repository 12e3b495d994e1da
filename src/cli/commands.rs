// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `predict` and `check`, and
// their flags. Defaults match PredictConfig::default().
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::application::predict_use_case::PredictConfig;
use crate::data::featurizer::OversizePolicy;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Predict solubility for every molecule in the input table
    Predict(PredictArgs),

    /// Parse the input table only and list rows that would be dropped
    Check(CheckArgs),
}

/// What to do with molecules larger than the model input
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OversizeArg {
    /// Fail the whole run
    RejectBatch,
    /// Leave the molecule out and report it
    SkipMolecule,
}

impl From<OversizeArg> for OversizePolicy {
    fn from(a: OversizeArg) -> Self {
        match a {
            OversizeArg::RejectBatch  => OversizePolicy::RejectBatch,
            OversizeArg::SkipMolecule => OversizePolicy::SkipMolecule,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory holding model_config.json and model.mpk.gz
    #[arg(long, default_value = "models/graph_convolution")]
    pub model_dir: PathBuf,

    /// CSV file with a header row and a SMILES column
    #[arg(long, default_value = "data/To_predict.csv")]
    pub input: PathBuf,

    /// Where the timestamped result CSV is written
    #[arg(long, default_value = "data")]
    pub output_dir: PathBuf,

    #[arg(long, default_value = "Smiles")]
    pub smiles_column: String,

    /// Atom ceiling; defaults to the model's own and may not exceed it
    #[arg(long)]
    pub max_atoms: Option<usize>,

    #[arg(long, value_enum, default_value_t = OversizeArg::RejectBatch)]
    pub oversize_policy: OversizeArg,

    /// Molecules per inference batch
    #[arg(long, default_value_t = 128)]
    pub batch_size: usize,
}

/// The application layer never sees clap types.
impl From<PredictArgs> for PredictConfig {
    fn from(a: PredictArgs) -> Self {
        PredictConfig {
            model_dir:       a.model_dir,
            input:           a.input,
            output_dir:      a.output_dir,
            smiles_column:   a.smiles_column,
            max_atoms:       a.max_atoms,
            oversize_policy: a.oversize_policy.into(),
            batch_size:      a.batch_size,
        }
    }
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(long, default_value = "data/To_predict.csv")]
    pub input: PathBuf,

    #[arg(long, default_value = "Smiles")]
    pub smiles_column: String,
}
