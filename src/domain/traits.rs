// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline is written against these two seams rather than
// against Burn or the filesystem directly:
//
//   ScorePredictor — anything that turns feature
//                    representations into scores
//                    (Inferencer over a Burn model)
//   ResultSink     — anything that persists a ResultTable
//                    (ResultWriter to a CSV directory)
//
// Tests swap in small in-memory implementations to drive the
// failure paths without a real model or an unwritable disk.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::error::{PredictionError, WriteError};
use crate::domain::features::{GraphFeatures, ModelKind};
use crate::domain::record::{ResultTable, WriteReport};

// ─── ScorePredictor ───────────────────────────────────────────────────────────
/// A loaded, read-only model.
///
/// `predict` must be deterministic and must return exactly one row of
/// `tasks().len()` scores per input, in input order.
pub trait ScorePredictor {
    /// Which model family this is; decides how molecules are featurized.
    fn kind(&self) -> ModelKind;

    /// Names of the predicted properties, in output order.
    fn tasks(&self) -> &[String];

    /// Largest molecule (in atoms) the model input can hold.
    fn max_atoms(&self) -> usize;

    fn predict(&self, features: &[GraphFeatures]) -> Result<Vec<Vec<f32>>, PredictionError>;
}

// ─── ResultSink ───────────────────────────────────────────────────────────────
/// A destination for assembled results.
pub trait ResultSink {
    /// Persist the table. Must never overwrite a previous run's output.
    fn write(&self, table: &ResultTable, kind: ModelKind) -> Result<WriteReport, WriteError>;
}
