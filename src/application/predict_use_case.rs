// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Runs one prediction job as a linear state machine:
//
//   Init            validate PredictConfig
//   LoadModel       ModelStore → Inferencer          (Layer 5/6)
//   ReadInput       CSV → InputTable                 (Layer 4)
//   ParseMolecules  SMILES → Molecule, per row       (Layer 4)
//   Featurize       Molecule → GraphFeatures         (Layer 4)
//   Predict         GraphFeatures → scores           (Layer 5)
//   AssembleResults input rows + scores → ResultTable
//   WriteOutput     ResultTable → timestamped CSV    (Layer 6)
//
// Any stage can end the run in Failed(stage, reason), which is
// a PipelineFailure. Rows whose SMILES cannot be parsed are not
// failures: they are dropped and listed in the report.
//
// PredictionPipeline is generic over the model (ScorePredictor)
// and the destination (ResultSink). `predict_table` stops after
// AssembleResults and never touches the filesystem.
//
// Reference: Rust Book §10 (Generics and Traits)

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::data::{
    featurizer::{Featurizer, FeaturizerConfig, OversizePolicy, SkippedMolecule},
    loader::InputReader,
    smiles::MoleculeParser,
};
use crate::domain::{
    error::{ConfigError, ParseFailure, PipelineFailure, PredictionError, Stage},
    molecule::ParsedMolecule,
    record::{InputTable, ResultTable, WriteReport},
    traits::{ResultSink, ScorePredictor},
};
use crate::infra::result_writer::ResultWriter;
use crate::ml::inferencer::{Inferencer, DEFAULT_BATCH_SIZE};

// ─── Prediction Configuration ────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictConfig {
    pub model_dir:       PathBuf,
    pub input:           PathBuf,
    pub output_dir:      PathBuf,
    pub smiles_column:   String,
    /// Overrides the model's atom ceiling; must not exceed it.
    pub max_atoms:       Option<usize>,
    pub oversize_policy: OversizePolicy,
    pub batch_size:      usize,
}

impl Default for PredictConfig {
    fn default() -> Self {
        Self {
            model_dir:       PathBuf::from("models/graph_convolution"),
            input:           PathBuf::from("data/To_predict.csv"),
            output_dir:      PathBuf::from("data"),
            smiles_column:   "Smiles".to_string(),
            max_atoms:       None,
            oversize_policy: OversizePolicy::RejectBatch,
            batch_size:      DEFAULT_BATCH_SIZE,
        }
    }
}

impl PredictConfig {
    /// Checks that need no model.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.smiles_column.trim().is_empty() {
            return Err(ConfigError::EmptyColumn);
        }
        if self.max_atoms == Some(0) {
            return Err(ConfigError::ZeroMaxAtoms);
        }
        Ok(())
    }

    /// Effective atom ceiling for a model that accepts up to `model_max`.
    pub fn resolve_max_atoms(&self, model_max: usize) -> Result<usize, ConfigError> {
        match self.max_atoms {
            None => Ok(model_max),
            Some(0) => Err(ConfigError::ZeroMaxAtoms),
            Some(requested) if requested > model_max => {
                Err(ConfigError::MaxAtomsAboveModel { requested, model: model_max })
            }
            Some(requested) => Ok(requested),
        }
    }
}

// ─── Reports ──────────────────────────────────────────────────────────────────

/// An input row left out because its SMILES did not parse.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRow {
    pub row:     usize,
    pub failure: ParseFailure,
}

/// Everything computed up to AssembleResults.
#[derive(Debug, Clone)]
pub struct PredictionReport {
    pub table:      ResultTable,
    pub input_rows: usize,
    pub dropped:    Vec<DroppedRow>,
    pub skipped:    Vec<SkippedMolecule>,
}

impl PredictionReport {
    pub fn predicted(&self) -> usize {
        self.table.len()
    }
}

/// A completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub report:  PredictionReport,
    pub written: WriteReport,
}

/// Parse every row; failures are collected, never fatal.
pub fn parse_rows(parser: &MoleculeParser, table: &InputTable) -> (Vec<ParsedMolecule>, Vec<DroppedRow>) {
    let mut parsed  = Vec::with_capacity(table.len());
    let mut dropped = Vec::new();
    for record in &table.records {
        match parser.parse(&record.smiles) {
            Ok(molecule) => parsed.push(ParsedMolecule {
                row:    record.row,
                smiles: record.smiles.clone(),
                molecule,
            }),
            Err(failure) => {
                tracing::warn!("Dropping row {}: {}", record.row, failure);
                dropped.push(DroppedRow { row: record.row, failure });
            }
        }
    }
    (parsed, dropped)
}

// ─── PredictionPipeline ───────────────────────────────────────────────────────
pub struct PredictionPipeline<P, S> {
    predictor: P,
    sink:      S,
    config:    PredictConfig,
    parser:    MoleculeParser,
}

impl<P: ScorePredictor, S: ResultSink> PredictionPipeline<P, S> {
    pub fn new(predictor: P, sink: S, config: PredictConfig) -> Self {
        Self { predictor, sink, config, parser: MoleculeParser::new() }
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    /// ReadInput through WriteOutput.
    pub fn run(&self) -> Result<PipelineOutcome, PipelineFailure> {
        let table = {
            let _span = tracing::info_span!("read_input").entered();
            InputReader::new(&self.config.input, &self.config.smiles_column)
                .read()
                .map_err(|e| PipelineFailure::at(Stage::ReadInput, e))?
        };

        let report = self.predict_table(&table)?;

        let _span = tracing::info_span!("write_output").entered();
        match self.sink.write(&report.table, self.predictor.kind()) {
            Ok(written) => Ok(PipelineOutcome { report, written }),
            Err(e) => Err(PipelineFailure::at(Stage::WriteOutput, e).with_results(report.table)),
        }
    }

    /// ParseMolecules through AssembleResults, in memory.
    pub fn predict_table(&self, table: &InputTable) -> Result<PredictionReport, PipelineFailure> {
        let kind = self.predictor.kind();
        let max_atoms = self
            .config
            .resolve_max_atoms(self.predictor.max_atoms())
            .map_err(|e| PipelineFailure::at(Stage::Init, e))?;

        // ── ParseMolecules ──
        let (parsed, dropped) = {
            let _span = tracing::info_span!("parse_molecules").entered();
            let (parsed, dropped) = parse_rows(&self.parser, table);
            tracing::info!("Parsed {} of {} rows ({} dropped)", parsed.len(), table.len(), dropped.len());
            (parsed, dropped)
        };

        // ── Featurize ──
        let featurized = {
            let _span = tracing::info_span!("featurize").entered();
            Featurizer::new(FeaturizerConfig {
                max_atoms,
                kind,
                policy: self.config.oversize_policy,
            })
            .featurize(&parsed)
            .map_err(|e| PipelineFailure::at(Stage::Featurize, e))?
        };

        // ── Predict ──
        let scores = {
            let _span = tracing::info_span!("predict").entered();
            tracing::info!("Predicting with {} Model...", kind.display_name());
            let scores = self
                .predictor
                .predict(&featurized.features)
                .map_err(|e| PipelineFailure::at(Stage::Predict, e))?;
            if scores.len() != featurized.features.len() {
                return Err(PipelineFailure::at(
                    Stage::Predict,
                    PredictionError::OutputShape {
                        expected: featurized.features.len(),
                        got:      scores.len(),
                    },
                ));
            }
            scores
        };

        // ── AssembleResults ──
        let _span = tracing::info_span!("assemble_results").entered();
        let mut results = ResultTable::new(&table.headers, self.predictor.tasks());
        for (&row, row_scores) in featurized.rows.iter().zip(scores) {
            results.push(&table.records[row], row_scores);
        }

        Ok(PredictionReport {
            table:      results,
            input_rows: table.len(),
            dropped,
            skipped:    featurized.skipped,
        })
    }
}

// ─── PredictUseCase ───────────────────────────────────────────────────────────
// Owns the config; loads the real model and writes real files.
pub struct PredictUseCase {
    config: PredictConfig,
}

impl PredictUseCase {
    pub fn new(config: PredictConfig) -> Self {
        Self { config }
    }

    pub fn execute(self) -> Result<PipelineOutcome, PipelineFailure> {
        // ── Init ──
        self.config
            .validate()
            .map_err(|e| PipelineFailure::at(Stage::Init, e))?;

        // ── LoadModel ──
        let inferencer = {
            let _span = tracing::info_span!("load_model").entered();
            Inferencer::load(&self.config.model_dir)
                .map_err(|e| PipelineFailure::at(Stage::LoadModel, e))?
                .with_batch_size(self.config.batch_size)
        };
        self.config
            .resolve_max_atoms(inferencer.max_atoms())
            .map_err(|e| PipelineFailure::at(Stage::Init, e))?;

        let sink = ResultWriter::new(&self.config.output_dir);
        let outcome = PredictionPipeline::new(inferencer, sink, self.config).run()?;
        tracing::info!(
            "Done: {} of {} rows predicted",
            outcome.report.predicted(),
            outcome.report.input_rows
        );
        Ok(outcome)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;

    use crate::domain::error::{PipelineError, WriteError};
    use crate::domain::features::{GraphFeatures, ModelKind};
    use crate::infra::checkpoint::ModelStore;
    use crate::ml::model::ModelManifest;

    /// Scores each molecule with its atom count.
    struct AtomCounter {
        tasks:     Vec<String>,
        max_atoms: usize,
    }

    impl AtomCounter {
        fn new(max_atoms: usize) -> Self {
            Self { tasks: vec!["Solubility".to_string()], max_atoms }
        }
    }

    impl ScorePredictor for AtomCounter {
        fn kind(&self) -> ModelKind { ModelKind::GraphConv }
        fn tasks(&self) -> &[String] { &self.tasks }
        fn max_atoms(&self) -> usize { self.max_atoms }
        fn predict(&self, features: &[GraphFeatures]) -> Result<Vec<Vec<f32>>, PredictionError> {
            Ok(features.iter().map(|f| vec![f.num_atoms as f32]).collect())
        }
    }

    #[derive(Default)]
    struct Recorder {
        tables: RefCell<Vec<ResultTable>>,
    }

    impl ResultSink for Recorder {
        fn write(&self, table: &ResultTable, _kind: ModelKind) -> Result<WriteReport, WriteError> {
            self.tables.borrow_mut().push(table.clone());
            Ok(WriteReport { path: PathBuf::from("memory.csv"), rows: table.len() })
        }
    }

    struct BrokenDisk;

    impl ResultSink for BrokenDisk {
        fn write(&self, _table: &ResultTable, _kind: ModelKind) -> Result<WriteReport, WriteError> {
            Err(WriteError::Write { path: PathBuf::from("out.csv"), details: "disk full".into() })
        }
    }

    fn write_input(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("To_predict.csv");
        fs::write(&path, body).unwrap();
        path
    }

    fn table(smiles: &[&str]) -> InputTable {
        let rows = smiles.iter().map(|s| vec![s.to_string()]).collect();
        InputTable::from_rows(vec!["Smiles".to_string()], 0, rows)
    }

    fn saved_model(dir: &Path, kind: ModelKind) -> PathBuf {
        let model_dir = dir.join("model");
        let manifest = ModelManifest { hidden_size: 8, dense_size: 16, ..ModelManifest::new(kind) };
        let net = manifest.init::<crate::ml::inferencer::InferBackend>(&Default::default());
        ModelStore::new(&model_dir).save(&manifest, &net).unwrap();
        model_dir
    }

    fn config_in(dir: &Path, model_dir: PathBuf, input: PathBuf) -> PredictConfig {
        PredictConfig {
            model_dir,
            input,
            output_dir: dir.join("out"),
            ..PredictConfig::default()
        }
    }

    fn output_files(dir: &Path) -> usize {
        fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn test_config_defaults() {
        let cfg = PredictConfig::default();
        assert_eq!(cfg.model_dir, PathBuf::from("models/graph_convolution"));
        assert_eq!(cfg.input, PathBuf::from("data/To_predict.csv"));
        assert_eq!(cfg.smiles_column, "Smiles");
        assert_eq!(cfg.batch_size, 128);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero_batch = PredictConfig { batch_size: 0, ..PredictConfig::default() };
        assert_eq!(zero_batch.validate(), Err(ConfigError::ZeroBatchSize));
        let no_column = PredictConfig { smiles_column: " ".into(), ..PredictConfig::default() };
        assert_eq!(no_column.validate(), Err(ConfigError::EmptyColumn));

        let cfg = PredictConfig { max_atoms: Some(60), ..PredictConfig::default() };
        assert_eq!(
            cfg.resolve_max_atoms(50),
            Err(ConfigError::MaxAtomsAboveModel { requested: 60, model: 50 })
        );
        assert_eq!(PredictConfig::default().resolve_max_atoms(50), Ok(50));
        let smaller = PredictConfig { max_atoms: Some(20), ..PredictConfig::default() };
        assert_eq!(smaller.resolve_max_atoms(50), Ok(20));
    }

    #[test]
    fn test_invalid_rows_are_dropped_and_order_kept() {
        let pipeline = PredictionPipeline::new(AtomCounter::new(50), Recorder::default(), PredictConfig::default());
        let report = pipeline
            .predict_table(&table(&["CCO", "not-a-molecule", "c1ccccc1"]))
            .unwrap();

        assert_eq!(report.input_rows, 3);
        assert_eq!(report.predicted(), 2);
        assert_eq!(report.table.records[0].smiles, "CCO");
        assert_eq!(report.table.records[0].scores, vec![3.0]);
        assert_eq!(report.table.records[1].smiles, "c1ccccc1");
        assert_eq!(report.table.records[1].scores, vec![6.0]);

        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].row, 1);
        assert_eq!(report.dropped[0].failure.smiles, "not-a-molecule");
        assert_eq!(report.table.headers, vec!["Smiles", "Predicted Solubility"]);
    }

    #[test]
    fn test_all_rows_invalid_gives_empty_table() {
        let pipeline = PredictionPipeline::new(AtomCounter::new(50), Recorder::default(), PredictConfig::default());
        let report = pipeline.predict_table(&table(&["", "Xx"])).unwrap();
        assert!(report.table.is_empty());
        assert_eq!(report.dropped.len(), 2);
    }

    #[test]
    fn test_oversize_policies() {
        let rows = table(&["CCCCCC", "CC"]);

        let strict = PredictionPipeline::new(
            AtomCounter::new(50),
            Recorder::default(),
            PredictConfig { max_atoms: Some(4), ..PredictConfig::default() },
        );
        let failure = strict.predict_table(&rows).unwrap_err();
        assert_eq!(failure.stage, Stage::Featurize);

        let lenient = PredictionPipeline::new(
            AtomCounter::new(50),
            Recorder::default(),
            PredictConfig {
                max_atoms: Some(4),
                oversize_policy: OversizePolicy::SkipMolecule,
                ..PredictConfig::default()
            },
        );
        let report = lenient.predict_table(&rows).unwrap();
        assert_eq!(report.predicted(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 0);
    }

    #[test]
    fn test_max_atoms_above_model_is_config_error() {
        let pipeline = PredictionPipeline::new(
            AtomCounter::new(10),
            Recorder::default(),
            PredictConfig { max_atoms: Some(11), ..PredictConfig::default() },
        );
        let failure = pipeline.predict_table(&table(&["C"])).unwrap_err();
        assert_eq!(failure.stage, Stage::Init);
        assert!(matches!(failure.error, PipelineError::Config(_)));
    }

    #[test]
    fn test_write_failure_keeps_results() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "Smiles\nCCO\n");
        let config = PredictConfig { input, ..PredictConfig::default() };
        let failure = PredictionPipeline::new(AtomCounter::new(50), BrokenDisk, config)
            .run()
            .unwrap_err();
        assert_eq!(failure.stage, Stage::WriteOutput);
        assert_eq!(failure.recovered.unwrap().len(), 1);
    }

    #[test]
    fn test_run_hands_table_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "Id,Smiles\na,CCO\nb,??\nc,N\n");
        let config = PredictConfig { input, ..PredictConfig::default() };
        let pipeline = PredictionPipeline::new(AtomCounter::new(50), Recorder::default(), config);
        let outcome = pipeline.run().unwrap();

        assert_eq!(outcome.written.rows, 2);
        let tables = pipeline.sink.tables.borrow();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].records[1].values, vec!["c", "N"]);
    }

    #[test]
    fn test_end_to_end_with_saved_model() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = saved_model(dir.path(), ModelKind::GraphConv);
        let input = write_input(dir.path(), "Smiles\nCCO\nnot-a-molecule\nc1ccccc1\n");
        let config = config_in(dir.path(), model_dir, input);

        let outcome = PredictUseCase::new(config).execute().unwrap();
        assert_eq!(outcome.report.predicted(), 2);
        assert_eq!(outcome.report.dropped.len(), 1);

        let text = fs::read_to_string(&outcome.written.path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Smiles,Predicted Solubility");
        assert!(lines[1].starts_with("CCO,"));
        assert!(lines[2].starts_with("c1ccccc1,"));
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_same_input_same_scores_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = saved_model(dir.path(), ModelKind::Dag);
        let input = write_input(dir.path(), "Smiles\nCCO\nc1ccccc1\nCC(=O)O\n");
        let config = config_in(dir.path(), model_dir, input);

        let first  = PredictUseCase::new(config.clone()).execute().unwrap();
        let second = PredictUseCase::new(config).execute().unwrap();
        assert_ne!(first.written.path, second.written.path);
        assert_eq!(first.report.table, second.report.table);
        assert!(first.written.path.file_name().unwrap().to_string_lossy().starts_with("PredictedDAG_"));
    }

    #[test]
    fn test_missing_model_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "Smiles\nCCO\n");
        let config = config_in(dir.path(), dir.path().join("no-model"), input);

        let failure = PredictUseCase::new(config).execute().unwrap_err();
        assert_eq!(failure.stage, Stage::LoadModel);
        assert!(matches!(failure.error, PipelineError::ModelNotFound(_)));
        assert_eq!(output_files(&dir.path().join("out")), 0);
    }

    #[test]
    fn test_bad_max_atoms_fails_before_reading_input() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = saved_model(dir.path(), ModelKind::GraphConv);
        let config = PredictConfig {
            max_atoms: Some(60),
            ..config_in(dir.path(), model_dir, dir.path().join("absent.csv"))
        };

        let failure = PredictUseCase::new(config).execute().unwrap_err();
        assert_eq!(failure.stage, Stage::Init);
        assert!(matches!(
            failure.error,
            PipelineError::Config(ConfigError::MaxAtomsAboveModel { requested: 60, model: 50 })
        ));
        assert_eq!(output_files(&dir.path().join("out")), 0);
    }

    #[test]
    fn test_missing_column_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let model_dir = saved_model(dir.path(), ModelKind::GraphConv);
        let input = write_input(dir.path(), "Structure\nCCO\n");
        let config = config_in(dir.path(), model_dir, input);

        let failure = PredictUseCase::new(config).execute().unwrap_err();
        assert_eq!(failure.stage, Stage::ReadInput);
        assert!(matches!(failure.error, PipelineError::InputRead(_)));
        assert_eq!(output_files(&dir.path().join("out")), 0);
    }
}
