// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// One error type per failure mode, so every way the job can
// fail is distinguishable and testable on its own:
//
//   ParseFailure        per-row, collected, never aborts
//   ModelNotFoundError  fatal at LoadModel
//   InputReadError      fatal at ReadInput
//   FeaturizationError  fatal at Featurize (unless skipping)
//   PredictionError     fatal at Predict
//   WriteError          fatal at WriteOutput, results kept
//   ConfigError         fatal before any work starts
//
// PipelineFailure pairs the error with the Stage it came
// from; that is what the CLI prints and exits on.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::molecule::Element;
use crate::domain::record::ResultTable;

/// Pipeline states, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    Init,
    LoadModel,
    ReadInput,
    ParseMolecules,
    Featurize,
    Predict,
    AssembleResults,
    WriteOutput,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init            => "init",
            Stage::LoadModel       => "load-model",
            Stage::ReadInput       => "read-input",
            Stage::ParseMolecules  => "parse-molecules",
            Stage::Featurize       => "featurize",
            Stage::Predict         => "predict",
            Stage::AssembleResults => "assemble-results",
            Stage::WriteOutput     => "write-output",
            Stage::Done            => "done",
        };
        f.write_str(name)
    }
}

// ─── Per-row parse failures ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmilesError {
    #[error("empty SMILES string")]
    Empty,

    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unknown element '{symbol}' at position {pos}")]
    UnknownElement { symbol: String, pos: usize },

    #[error("'{symbol}' cannot be aromatic (position {pos})")]
    NotAromatic { symbol: String, pos: usize },

    #[error("bracket atom opened at position {0} is never closed")]
    UnclosedBracket(usize),

    #[error("unbalanced parenthesis at position {0}")]
    UnbalancedParen(usize),

    #[error("ring bond {0} is never closed")]
    UnclosedRing(u16),

    #[error("ring closure {label} at position {pos} is invalid")]
    InvalidRingClosure { label: u16, pos: usize },

    #[error("bond at position {0} is not followed by an atom")]
    DanglingBond(usize),

    #[error("aromatic atom {index} ({element}) is not in a ring")]
    AromaticOutsideRing { index: usize, element: Element },

    #[error("atom {index} ({element}) has unsupported valence {valence}")]
    UnsupportedValence { index: usize, element: Element, valence: u8 },

    #[error("charge at position {0} is outside -15..=15")]
    ChargeOutOfRange(usize),

    #[error("aromatic system containing atom {0} cannot be kekulized")]
    Kekulize(usize),
}

/// A row whose SMILES could not be turned into a Molecule.
/// This is data, not control flow: the pipeline collects these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot parse SMILES '{smiles}': {reason}")]
pub struct ParseFailure {
    pub smiles: String,
    pub reason: SmilesError,
}

// ─── Fatal errors ─────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
#[error("no usable model at '{path}': {reason}")]
pub struct ModelNotFoundError {
    pub path:   PathBuf,
    pub reason: String,
}

impl ModelNotFoundError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self { path: path.into(), reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum InputReadError {
    #[error("cannot open input '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("input '{path}' has no '{column}' column (found: {available:?})")]
    MissingColumn {
        path:      PathBuf,
        column:    String,
        available: Vec<String>,
    },

    #[error("malformed CSV in '{path}': {details}")]
    Malformed { path: PathBuf, details: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeaturizationError {
    #[error("molecule at row {row} has {atoms} atoms, above the limit of {max_atoms}")]
    TooManyAtoms { row: usize, atoms: usize, max_atoms: usize },
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("feature width {got} does not match the model's {expected}")]
    FeatureWidth { expected: usize, got: usize },

    #[error("molecule with {atoms} atoms does not fit the model's {max_atoms}-atom input")]
    Oversized { atoms: usize, max_atoms: usize },

    #[error("model returned {got} values, expected {expected}")]
    OutputShape { expected: usize, got: usize },

    #[error("DAG model needs DAG features but molecule {0} has none")]
    MissingDag(usize),

    #[error("tensor read-back failed: {0}")]
    Tensor(String),
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot create output directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create output file '{path}': {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing '{path}': {details}")]
    Write { path: PathBuf, details: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("max_atoms must be at least 1")]
    ZeroMaxAtoms,

    #[error("max_atoms {requested} exceeds the model's input size of {model}")]
    MaxAtomsAboveModel { requested: usize, model: usize },

    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("SMILES column name must not be empty")]
    EmptyColumn,
}

/// Any fatal error, by kind.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    ModelNotFound(#[from] ModelNotFoundError),

    #[error(transparent)]
    InputRead(#[from] InputReadError),

    #[error(transparent)]
    Featurization(#[from] FeaturizationError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Terminal `Failed(stage, reason)` state of a pipeline run.
///
/// `recovered` holds the assembled results when the failure happened
/// after they were computed (WriteOutput), so nothing is lost.
#[derive(Debug, Error)]
#[error("{stage} failed: {error}")]
pub struct PipelineFailure {
    pub stage:     Stage,
    #[source]
    pub error:     PipelineError,
    pub recovered: Option<ResultTable>,
}

impl PipelineFailure {
    pub fn at(stage: Stage, error: impl Into<PipelineError>) -> Self {
        Self { stage, error: error.into(), recovered: None }
    }

    pub fn with_results(mut self, results: ResultTable) -> Self {
        self.recovered = Some(results);
        self
    }
}
