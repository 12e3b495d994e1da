// ============================================================
// Layer 6 — Model Store
// ============================================================
// Loads (and, for fixtures and tooling, saves) a trained model
// artifact using Burn's CompactRecorder.
//
// Artifact layout:
//   <model_dir>/
//     model_config.json   ← ModelManifest: family, tasks,
//                           max_atoms, layer sizes
//     model.mpk.gz        ← network weights
//
// The manifest is read first so the exact architecture can be
// rebuilt before the weights are loaded into it.
//
// Any problem on the load path (missing directory, unreadable
// or incompatible manifest, missing or unreadable weights) is
// a ModelNotFoundError. Loading never creates directories.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{HalfPrecisionSettings, NamedMpkGzFileRecorder, Recorder},
};

use crate::domain::error::ModelNotFoundError;
use crate::ml::model::{ModelManifest, SolubilityNet};

pub const MANIFEST_FILE: &str = "model_config.json";
/// Weight file stem; the recorder appends `.mpk.gz`.
pub const WEIGHTS_STEM: &str = "model";
pub const WEIGHTS_FILE: &str = "model.mpk.gz";

pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read and check `model_config.json`.
    pub fn load_manifest(&self) -> Result<ModelManifest, ModelNotFoundError> {
        if !self.dir.is_dir() {
            return Err(ModelNotFoundError::new(&self.dir, "directory does not exist"));
        }
        let path = self.dir.join(MANIFEST_FILE);
        let json = fs::read_to_string(&path).map_err(|e| {
            ModelNotFoundError::new(&self.dir, format!("cannot read {MANIFEST_FILE}: {e}"))
        })?;
        let manifest: ModelManifest = serde_json::from_str(&json).map_err(|e| {
            ModelNotFoundError::new(&self.dir, format!("invalid {MANIFEST_FILE}: {e}"))
        })?;
        if let Some(problem) = manifest.problem() {
            return Err(ModelNotFoundError::new(&self.dir, problem));
        }
        Ok(manifest)
    }

    /// Rebuild the network described by `manifest` and load its weights.
    pub fn load_model<B: Backend>(
        &self,
        manifest: &ModelManifest,
        device:   &B::Device,
    ) -> Result<SolubilityNet<B>, ModelNotFoundError> {
        if !self.dir.join(WEIGHTS_FILE).is_file() {
            return Err(ModelNotFoundError::new(
                &self.dir,
                format!("weights file {WEIGHTS_FILE} is missing"),
            ));
        }
        let path = self.dir.join(WEIGHTS_STEM);
        let recorder = NamedMpkGzFileRecorder::<HalfPrecisionSettings>::new();
        let unreadable = |e: burn::record::RecorderError| {
            ModelNotFoundError::new(&self.dir, format!("cannot load weights: {e}"))
        };

        let net = match manifest.init::<B>(device) {
            SolubilityNet::GraphConv(model) => {
                let record = recorder.load(path, device).map_err(unreadable)?;
                SolubilityNet::GraphConv(model.load_record(record))
            }
            SolubilityNet::Dag(model) => {
                let record = recorder.load(path, device).map_err(unreadable)?;
                SolubilityNet::Dag(model.load_record(record))
            }
        };
        tracing::debug!("Loaded weights from '{}'", self.dir.display());
        Ok(net)
    }

    /// Write a manifest and weights, creating the directory if needed.
    pub fn save<B: Backend>(&self, manifest: &ModelManifest, net: &SolubilityNet<B>) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create model directory '{}'", self.dir.display()))?;

        let manifest_path = self.dir.join(MANIFEST_FILE);
        fs::write(&manifest_path, serde_json::to_string_pretty(manifest)?)
            .with_context(|| format!("Cannot write '{}'", manifest_path.display()))?;

        let path = self.dir.join(WEIGHTS_STEM);
        let recorder = NamedMpkGzFileRecorder::<HalfPrecisionSettings>::new();
        match net {
            SolubilityNet::GraphConv(model) => recorder.record(model.clone().into_record(), path.clone()),
            SolubilityNet::Dag(model)       => recorder.record(model.clone().into_record(), path.clone()),
        }
        .with_context(|| format!("Failed to save weights to '{}'", path.display()))?;

        tracing::debug!("Saved {} model to '{}'", manifest.kind.display_name(), self.dir.display());
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::ModelKind;

    type TestBackend = burn::backend::NdArray;

    fn small(kind: ModelKind) -> ModelManifest {
        ModelManifest { max_atoms: 10, hidden_size: 4, dense_size: 8, ..ModelManifest::new(kind) }
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("nope"));
        let err = store.load_manifest().unwrap_err();
        assert!(err.reason.contains("does not exist"));
        assert!(!dir.path().join("nope").exists());
    }

    #[test]
    fn test_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModelStore::new(dir.path()).load_manifest().unwrap_err();
        assert!(err.reason.contains(MANIFEST_FILE));
    }

    #[test]
    fn test_garbage_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{ not json").unwrap();
        let err = ModelStore::new(dir.path()).load_manifest().unwrap_err();
        assert!(err.reason.starts_with("invalid"));
    }

    #[test]
    fn test_missing_weights() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = small(ModelKind::GraphConv);
        fs::write(dir.path().join(MANIFEST_FILE), serde_json::to_string(&manifest).unwrap()).unwrap();

        let store = ModelStore::new(dir.path());
        let loaded = store.load_manifest().unwrap();
        let err = store.load_model::<TestBackend>(&loaded, &Default::default()).unwrap_err();
        assert!(err.reason.contains(WEIGHTS_FILE));
    }

    #[test]
    fn test_save_then_load_both_families() {
        for kind in [ModelKind::GraphConv, ModelKind::Dag] {
            let dir = tempfile::tempdir().unwrap();
            let device = Default::default();
            let manifest = small(kind);
            let store = ModelStore::new(dir.path().join("model"));
            store.save(&manifest, &manifest.init::<TestBackend>(&device)).unwrap();

            assert!(store.dir().join(WEIGHTS_FILE).is_file());
            let loaded = store.load_manifest().unwrap();
            assert_eq!(loaded, manifest);
            let net = store.load_model::<TestBackend>(&loaded, &device).unwrap();
            assert_eq!(net.kind(), kind);
        }
    }
}
