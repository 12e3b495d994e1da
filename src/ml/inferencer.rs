// ============================================================
// Layer 5 — Inferencer
// ============================================================
use burn::{
    backend::{ndarray::NdArrayDevice, NdArray},
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    prelude::*,
};

use crate::data::batcher::GraphBatcher;
use crate::data::dataset::GraphDataset;
use crate::domain::error::{ModelNotFoundError, PredictionError};
use crate::domain::features::{GraphFeatures, ModelKind, ATOM_FEATURES};
use crate::domain::traits::ScorePredictor;
use crate::infra::checkpoint::ModelStore;
use crate::ml::model::{ModelManifest, SolubilityNet};

/// CPU backend: results do not depend on the host's GPU.
pub type InferBackend = NdArray;

pub const DEFAULT_BATCH_SIZE: usize = 128;

pub struct Inferencer {
    net:        SolubilityNet<InferBackend>,
    manifest:   ModelManifest,
    batch_size: usize,
    device:     NdArrayDevice,
}

impl Inferencer {
    /// Load a model artifact from `model_dir`.
    pub fn load(model_dir: impl Into<std::path::PathBuf>) -> Result<Self, ModelNotFoundError> {
        Self::from_store(&ModelStore::new(model_dir))
    }

    pub fn from_store(store: &ModelStore) -> Result<Self, ModelNotFoundError> {
        let device   = NdArrayDevice::default();
        let manifest = store.load_manifest()?;
        let net      = store.load_model::<InferBackend>(&manifest, &device)?;
        tracing::info!(
            "Loaded {} model from '{}' (max {} atoms, tasks: {})",
            manifest.kind.display_name(),
            store.dir().display(),
            manifest.max_atoms,
            manifest.tasks.join(", ")
        );
        Ok(Self { net, manifest, batch_size: DEFAULT_BATCH_SIZE, device })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn manifest(&self) -> &ModelManifest {
        &self.manifest
    }

    fn check(&self, index: usize, sample: &GraphFeatures) -> Result<(), PredictionError> {
        let width = sample.atom_features.len();
        if width != sample.num_atoms * ATOM_FEATURES {
            return Err(PredictionError::FeatureWidth {
                expected: sample.num_atoms * ATOM_FEATURES,
                got:      width,
            });
        }
        if sample.num_atoms > self.manifest.max_atoms {
            return Err(PredictionError::Oversized {
                atoms:     sample.num_atoms,
                max_atoms: self.manifest.max_atoms,
            });
        }
        if self.manifest.kind.needs_dag() && sample.dag.is_none() {
            return Err(PredictionError::MissingDag(index));
        }
        Ok(())
    }
}

impl ScorePredictor for Inferencer {
    fn kind(&self) -> ModelKind {
        self.manifest.kind
    }

    fn tasks(&self) -> &[String] {
        &self.manifest.tasks
    }

    fn max_atoms(&self) -> usize {
        self.manifest.max_atoms
    }

    /// One score row per input molecule, in input order.
    fn predict(&self, features: &[GraphFeatures]) -> Result<Vec<Vec<f32>>, PredictionError> {
        for (i, sample) in features.iter().enumerate() {
            self.check(i, sample)?;
        }

        let n_tasks = self.manifest.tasks.len();
        let dataset = GraphDataset::new(features);
        let batcher = GraphBatcher::<InferBackend>::new(
            self.device.clone(),
            self.manifest.max_atoms,
            self.manifest.kind.needs_dag(),
        );

        let mut scores = Vec::with_capacity(dataset.len());
        for start in (0..dataset.len()).step_by(self.batch_size) {
            let items = dataset.window(start, start + self.batch_size);
            let count = items.len();
            let output = self
                .net
                .forward(batcher.batch(items))
                .ok_or(PredictionError::MissingDag(start))?;

            let values = output
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| PredictionError::Tensor(format!("{e:?}")))?;
            if values.len() != count * n_tasks {
                return Err(PredictionError::OutputShape {
                    expected: count * n_tasks,
                    got:      values.len(),
                });
            }
            scores.extend(values.chunks(n_tasks).map(<[f32]>::to_vec));
            tracing::debug!("Scored molecules {}..{}", start, start + count);
        }
        Ok(scores)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::featurizer::{Featurizer, FeaturizerConfig, OversizePolicy};
    use crate::data::smiles::MoleculeParser;
    use crate::domain::molecule::ParsedMolecule;

    fn saved_model(kind: ModelKind) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let manifest = ModelManifest { max_atoms: 12, hidden_size: 8, dense_size: 16, ..ModelManifest::new(kind) };
        let net = manifest.init::<InferBackend>(&NdArrayDevice::default());
        ModelStore::new(dir.path()).save(&manifest, &net).unwrap();
        dir
    }

    fn featurize(smiles: &[&str], kind: ModelKind, max_atoms: usize) -> Vec<GraphFeatures> {
        let parser = MoleculeParser::new();
        let parsed: Vec<ParsedMolecule> = smiles
            .iter()
            .enumerate()
            .map(|(row, s)| ParsedMolecule { row, smiles: s.to_string(), molecule: parser.parse(s).unwrap() })
            .collect();
        Featurizer::new(FeaturizerConfig { max_atoms, kind, policy: OversizePolicy::RejectBatch })
            .featurize(&parsed)
            .unwrap()
            .features
    }

    #[test]
    fn test_missing_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Inferencer::load(dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_one_score_per_molecule_and_deterministic() {
        for kind in [ModelKind::GraphConv, ModelKind::Dag] {
            let dir = saved_model(kind);
            let inferencer = Inferencer::load(dir.path()).unwrap().with_batch_size(2);
            assert_eq!(inferencer.kind(), kind);
            assert_eq!(inferencer.max_atoms(), 12);

            let feats = featurize(&["CCO", "c1ccccc1", "CC(=O)O", "N"], kind, 12);
            let first = inferencer.predict(&feats).unwrap();
            let second = inferencer.predict(&feats).unwrap();
            assert_eq!(first.len(), 4);
            assert!(first.iter().all(|row| row.len() == 1 && row[0].is_finite()));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_batching_does_not_change_scores() {
        let dir = saved_model(ModelKind::GraphConv);
        let feats = featurize(&["CCO", "c1ccccc1", "CC(=O)O"], ModelKind::GraphConv, 12);
        let whole = Inferencer::load(dir.path()).unwrap().predict(&feats).unwrap();
        let single = Inferencer::load(dir.path()).unwrap().with_batch_size(1).predict(&feats).unwrap();
        for (a, b) in whole.iter().zip(&single) {
            assert!((a[0] - b[0]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_empty_input() {
        let dir = saved_model(ModelKind::GraphConv);
        let scores = Inferencer::load(dir.path()).unwrap().predict(&[]).unwrap();
        assert!(scores.is_empty());
    }

    #[test]
    fn test_oversized_molecule_rejected() {
        let dir = saved_model(ModelKind::GraphConv);
        let feats = featurize(&["CCCCCCCCCCCCCCC"], ModelKind::GraphConv, 20);
        let err = Inferencer::load(dir.path()).unwrap().predict(&feats).unwrap_err();
        assert!(matches!(err, PredictionError::Oversized { atoms: 15, max_atoms: 12 }));
    }

    #[test]
    fn test_dag_model_needs_dag_features() {
        let dir = saved_model(ModelKind::Dag);
        let feats = featurize(&["CCO"], ModelKind::GraphConv, 12);
        let err = Inferencer::load(dir.path()).unwrap().predict(&feats).unwrap_err();
        assert!(matches!(err, PredictionError::MissingDag(0)));
    }
}
