use burn::{
    nn::{Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::{DagBatch, GraphBatch};
use crate::domain::features::{ModelKind, ATOM_FEATURES};

// ─── Manifest ─────────────────────────────────────────────────────────────────

/// Architecture description stored next to the weights as
/// `model_config.json`. Enough to rebuild the network before
/// its record is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub kind:        ModelKind,
    #[serde(default = "default_tasks")]
    pub tasks:       Vec<String>,
    #[serde(default = "default_max_atoms")]
    pub max_atoms:   usize,
    #[serde(default = "default_n_features")]
    pub n_features:  usize,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_num_layers")]
    pub num_layers:  usize,
    #[serde(default = "default_dense_size")]
    pub dense_size:  usize,
}

fn default_tasks() -> Vec<String> { vec!["Solubility".to_string()] }
fn default_max_atoms() -> usize { 50 }
fn default_n_features() -> usize { ATOM_FEATURES }
fn default_hidden_size() -> usize { 64 }
fn default_num_layers() -> usize { 2 }
fn default_dense_size() -> usize { 128 }

impl ModelManifest {
    pub fn new(kind: ModelKind) -> Self {
        Self {
            kind,
            tasks:       default_tasks(),
            max_atoms:   default_max_atoms(),
            n_features:  default_n_features(),
            hidden_size: default_hidden_size(),
            num_layers:  default_num_layers(),
            dense_size:  default_dense_size(),
        }
    }

    /// Reason the manifest cannot describe a usable network, if any.
    pub fn problem(&self) -> Option<String> {
        if self.tasks.is_empty() {
            return Some("manifest lists no tasks".to_string());
        }
        if self.n_features != ATOM_FEATURES {
            return Some(format!(
                "manifest expects {} atom features, featurizer produces {ATOM_FEATURES}",
                self.n_features
            ));
        }
        if self.max_atoms == 0 || self.hidden_size == 0 || self.dense_size == 0 {
            return Some("manifest has a zero-sized dimension".to_string());
        }
        if self.kind == ModelKind::GraphConv && self.num_layers == 0 {
            return Some("graph convolution manifest has no layers".to_string());
        }
        None
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SolubilityNet<B> {
        match self.kind {
            ModelKind::GraphConv => SolubilityNet::GraphConv(
                GraphConvConfig::new(self.n_features, self.tasks.len())
                    .with_hidden_size(self.hidden_size)
                    .with_num_layers(self.num_layers)
                    .with_dense_size(self.dense_size)
                    .init(device),
            ),
            ModelKind::Dag => SolubilityNet::Dag(
                DagConfig::new(self.n_features, self.tasks.len())
                    .with_hidden_size(self.hidden_size)
                    .with_dense_size(self.dense_size)
                    .init(device),
            ),
        }
    }
}

// ─── Graph convolution ────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct GraphConvConfig {
    pub n_features:  usize,
    pub n_tasks:     usize,
    #[config(default = 64)]
    pub hidden_size: usize,
    #[config(default = 2)]
    pub num_layers:  usize,
    #[config(default = 128)]
    pub dense_size:  usize,
}

impl GraphConvConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GraphConvModel<B> {
        let layers = (0..self.num_layers)
            .map(|i| {
                let d_in = if i == 0 { self.n_features } else { self.hidden_size };
                GraphConvLayer {
                    self_linear:     LinearConfig::new(d_in, self.hidden_size).init(device),
                    neighbor_linear: LinearConfig::new(d_in, self.hidden_size).init(device),
                }
            })
            .collect();
        GraphConvModel {
            layers,
            dense:  LinearConfig::new(self.hidden_size, self.dense_size).init(device),
            output: LinearConfig::new(self.dense_size, self.n_tasks).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct GraphConvLayer<B: Backend> {
    pub self_linear:     Linear<B>,
    pub neighbor_linear: Linear<B>,
}

impl<B: Backend> GraphConvLayer<B> {
    /// h: [batch, N, d_in], adjacency: [batch, N, N], mask: [batch, N, 1]
    pub fn forward(
        &self,
        h:         Tensor<B, 3>,
        adjacency: Tensor<B, 3>,
        mask:      Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let neighbors = adjacency.matmul(h.clone());
        let out = relu(self.self_linear.forward(h) + self.neighbor_linear.forward(neighbors));
        let [b, n, d] = out.dims();
        out * mask.expand([b, n, d])
    }
}

#[derive(Module, Debug)]
pub struct GraphConvModel<B: Backend> {
    pub layers: Vec<GraphConvLayer<B>>,
    pub dense:  Linear<B>,
    pub output: Linear<B>,
}

impl<B: Backend> GraphConvModel<B> {
    /// Returns [batch, n_tasks].
    pub fn forward(
        &self,
        atom_features: Tensor<B, 3>,
        adjacency:     Tensor<B, 3>,
        mask:          Tensor<B, 3>,
    ) -> Tensor<B, 2> {
        let mut h = atom_features;
        for layer in &self.layers {
            h = layer.forward(h, adjacency.clone(), mask.clone());
        }
        // Sum readout over atoms; padding rows are already zero.
        let [b, _, d] = h.dims();
        let pooled = h.sum_dim(1).reshape([b, d]);
        self.output.forward(relu(self.dense.forward(pooled)))
    }
}

// ─── DAG ──────────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct DagConfig {
    pub n_features:  usize,
    pub n_tasks:     usize,
    #[config(default = 64)]
    pub hidden_size: usize,
    #[config(default = 128)]
    pub dense_size:  usize,
}

impl DagConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> DagModel<B> {
        DagModel {
            propagate:   LinearConfig::new(self.n_features + self.hidden_size, self.hidden_size)
                .init(device),
            gather:      LinearConfig::new(self.hidden_size, self.dense_size).init(device),
            output:      LinearConfig::new(self.dense_size, self.n_tasks).init(device),
            hidden_size: self.hidden_size,
        }
    }
}

/// Directed-acyclic-graph model: every atom is treated as the root of
/// its own DAG, information flows from the leaves toward the root, and
/// the per-root embeddings are summed into a molecule embedding.
#[derive(Module, Debug)]
pub struct DagModel<B: Backend> {
    pub propagate:   Linear<B>,
    pub gather:      Linear<B>,
    pub output:      Linear<B>,
    pub hidden_size: usize,
}

impl<B: Backend> DagModel<B> {
    /// Returns [batch, n_tasks].
    pub fn forward(
        &self,
        atom_features: Tensor<B, 3>,
        mask:          Tensor<B, 3>,
        dag:           DagBatch<B>,
    ) -> Tensor<B, 2> {
        let device = atom_features.device();
        let [b, n, f] = atom_features.dims();
        let [rows, _, depth_levels] = dag.levels.dims();
        let hidden = self.hidden_size;

        // One copy of the molecule's atom features per root: [b·N, N, F]
        let x = atom_features
            .unsqueeze_dim::<4>(1)
            .expand([b, n, n, f])
            .reshape([rows, n, f]);

        // ── Leaves first, root last ──
        let mut h = Tensor::<B, 3>::zeros([rows, n, hidden], &device);
        for depth in (0..depth_levels).rev() {
            let from_children = dag.children.clone().matmul(h.clone());
            let updated = relu(
                self.propagate
                    .forward(Tensor::cat(vec![x.clone(), from_children], 2)),
            );
            let at_depth = dag
                .levels
                .clone()
                .slice([0..rows, 0..n, depth..depth + 1])
                .expand([rows, n, hidden]);
            let keep = at_depth.clone().neg().add_scalar(1.0);
            h = h * keep + updated * at_depth;
        }

        // ── Root embeddings ──
        let root_level = dag
            .levels
            .slice([0..rows, 0..n, 0..1])
            .expand([rows, n, hidden]);
        let roots = (h * root_level).sum_dim(1).reshape([b, n, hidden]);

        // ── Gather ──
        let gathered = relu(self.gather.forward(roots));
        let [_, _, dense] = gathered.dims();
        let pooled = (gathered * mask.expand([b, n, dense]))
            .sum_dim(1)
            .reshape([b, dense]);
        self.output.forward(pooled)
    }
}

// ─── SolubilityNet ────────────────────────────────────────────────────────────

/// A loaded network of either family.
#[derive(Debug)]
pub enum SolubilityNet<B: Backend> {
    GraphConv(GraphConvModel<B>),
    Dag(DagModel<B>),
}

impl<B: Backend> SolubilityNet<B> {
    pub fn kind(&self) -> ModelKind {
        match self {
            SolubilityNet::GraphConv(_) => ModelKind::GraphConv,
            SolubilityNet::Dag(_)       => ModelKind::Dag,
        }
    }

    /// Returns None when a DAG network is handed a batch without DAG tensors.
    pub fn forward(&self, batch: GraphBatch<B>) -> Option<Tensor<B, 2>> {
        match self {
            SolubilityNet::GraphConv(model) => Some(model.forward(
                batch.atom_features,
                batch.adjacency,
                batch.atom_mask,
            )),
            SolubilityNet::Dag(model) => {
                let dag = batch.dag?;
                Some(model.forward(batch.atom_features, batch.atom_mask, dag))
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataloader::batcher::Batcher;
    use crate::data::batcher::GraphBatcher;
    use crate::data::featurizer::{Featurizer, FeaturizerConfig, OversizePolicy};
    use crate::data::smiles::MoleculeParser;
    use crate::domain::features::GraphFeatures;
    use crate::domain::molecule::ParsedMolecule;

    type TestBackend = burn::backend::NdArray;

    fn features(smiles: &[&str], kind: ModelKind, max_atoms: usize) -> Vec<GraphFeatures> {
        let parser = MoleculeParser::new();
        let parsed: Vec<ParsedMolecule> = smiles
            .iter()
            .enumerate()
            .map(|(row, s)| ParsedMolecule {
                row,
                smiles: s.to_string(),
                molecule: parser.parse(s).unwrap(),
            })
            .collect();
        Featurizer::new(FeaturizerConfig { max_atoms, kind, policy: OversizePolicy::RejectBatch })
            .featurize(&parsed)
            .unwrap()
            .features
    }

    fn small_manifest(kind: ModelKind) -> ModelManifest {
        ModelManifest { max_atoms: 12, hidden_size: 8, dense_size: 16, ..ModelManifest::new(kind) }
    }

    #[test]
    fn test_manifest_defaults_fill_missing_fields() {
        let manifest: ModelManifest = serde_json::from_str(r#"{"kind":"dag"}"#).unwrap();
        assert_eq!(manifest, ModelManifest::new(ModelKind::Dag));
        assert_eq!(manifest.max_atoms, 50);
        assert_eq!(manifest.tasks, vec!["Solubility"]);
        assert!(manifest.problem().is_none());
    }

    #[test]
    fn test_manifest_rejects_wrong_feature_width() {
        let manifest = ModelManifest { n_features: 10, ..ModelManifest::new(ModelKind::GraphConv) };
        assert!(manifest.problem().unwrap().contains("10"));
    }

    #[test]
    fn test_graph_conv_output_shape() {
        let device = Default::default();
        let manifest = small_manifest(ModelKind::GraphConv);
        let net = manifest.init::<TestBackend>(&device);
        let batcher = GraphBatcher::<TestBackend>::new(device, 12, false);
        let batch = batcher.batch(features(&["CCO", "c1ccccc1", "C"], ModelKind::GraphConv, 12));
        let out = net.forward(batch).unwrap();
        assert_eq!(out.dims(), [3, 1]);
    }

    #[test]
    fn test_dag_output_shape() {
        let device = Default::default();
        let manifest = small_manifest(ModelKind::Dag);
        let net = manifest.init::<TestBackend>(&device);
        let batcher = GraphBatcher::<TestBackend>::new(device, 12, true);
        let batch = batcher.batch(features(&["CCO", "c1ccccc1"], ModelKind::Dag, 12));
        let out = net.forward(batch).unwrap();
        assert_eq!(out.dims(), [2, 1]);
    }

    #[test]
    fn test_dag_without_structure_is_none() {
        let device = Default::default();
        let net = small_manifest(ModelKind::Dag).init::<TestBackend>(&device);
        let batcher = GraphBatcher::<TestBackend>::new(device, 12, false);
        let batch = batcher.batch(features(&["CCO"], ModelKind::GraphConv, 12));
        assert!(net.forward(batch).is_none());
    }

    #[test]
    fn test_padding_does_not_change_scores() {
        let device = Default::default();
        let net = small_manifest(ModelKind::GraphConv).init::<TestBackend>(&device);
        let feats = features(&["CCO"], ModelKind::GraphConv, 12);

        let narrow = GraphBatcher::<TestBackend>::new(device.clone(), 3, false).batch(feats.clone());
        let wide   = GraphBatcher::<TestBackend>::new(device, 12, false).batch(feats);
        let a = net.forward(narrow).unwrap().into_data().to_vec::<f32>().unwrap();
        let b = net.forward(wide).unwrap().into_data().to_vec::<f32>().unwrap();
        assert!((a[0] - b[0]).abs() < 1e-4);
    }
}
