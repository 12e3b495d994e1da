// ============================================================
// Layer 4 — Graph Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<GraphFeatures>
// (ragged: every molecule has its own atom count) into dense,
// padded tensors the models can consume.
//
// Padding scheme, N = max_atoms, F = 75:
//
//   atom_features [batch, N, F]   zeros past num_atoms
//   adjacency     [batch, N, N]   1.0 where atoms are bonded
//   atom_mask     [batch, N, 1]   1.0 for real atoms
//
// For the DAG family the per-root structures are flattened so
// that every (molecule, root) pair is one row:
//
//   children [batch·N, N, N]   children[r, v, u] = 1 when u is
//                              one step further from root r
//                              than v, and bonded to it
//   levels   [batch·N, N, L]   one-hot BFS depth of each atom
//                              from root r; L = deepest + 1
//
// Padding atoms and unreachable atoms are all-zero rows, so
// they contribute nothing downstream.
//
// The batcher never fails: the inferencer checks atom counts
// and DAG presence before batching.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::domain::features::{GraphFeatures, ATOM_FEATURES};

// ─── GraphBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct GraphBatch<B: Backend> {
    pub atom_features: Tensor<B, 3>,
    pub adjacency:     Tensor<B, 3>,
    pub atom_mask:     Tensor<B, 3>,
    pub dag:           Option<DagBatch<B>>,
}

#[derive(Debug, Clone)]
pub struct DagBatch<B: Backend> {
    pub children: Tensor<B, 3>,
    pub levels:   Tensor<B, 3>,
}

// ─── GraphBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct GraphBatcher<B: Backend> {
    pub device:    B::Device,
    pub max_atoms: usize,
    pub with_dag:  bool,
}

impl<B: Backend> GraphBatcher<B> {
    pub fn new(device: B::Device, max_atoms: usize, with_dag: bool) -> Self {
        Self { device, max_atoms, with_dag }
    }

    fn dag_batch(&self, items: &[GraphFeatures]) -> DagBatch<B> {
        let n = self.max_atoms;
        let rows = items.len() * n;
        let depth_levels = items
            .iter()
            .filter_map(|g| g.dag.as_ref())
            .map(|d| d.max_depth())
            .max()
            .unwrap_or(0)
            + 1;

        let mut children = vec![0.0f32; rows * n * n];
        let mut levels   = vec![0.0f32; rows * n * depth_levels];

        for (i, g) in items.iter().enumerate() {
            let Some(dag) = g.dag.as_ref() else { continue };
            for root in 0..g.num_atoms {
                let row = i * n + root;
                for &(parent, child) in &dag.edges[root] {
                    children[(row * n + parent) * n + child] = 1.0;
                }
                for (atom, depth) in dag.depths[root].iter().enumerate() {
                    if let Some(d) = depth {
                        levels[(row * n + atom) * depth_levels + d] = 1.0;
                    }
                }
            }
        }

        DagBatch {
            children: Tensor::from_data(TensorData::new(children, [rows, n, n]), &self.device),
            levels:   Tensor::from_data(TensorData::new(levels, [rows, n, depth_levels]), &self.device),
        }
    }
}

impl<B: Backend> Batcher<GraphFeatures, GraphBatch<B>> for GraphBatcher<B> {
    /// Pad and stack a list of molecules.
    fn batch(&self, items: Vec<GraphFeatures>) -> GraphBatch<B> {
        let batch_size = items.len();
        let n = self.max_atoms;

        let mut features  = vec![0.0f32; batch_size * n * ATOM_FEATURES];
        let mut adjacency = vec![0.0f32; batch_size * n * n];
        let mut mask      = vec![0.0f32; batch_size * n];

        for (i, g) in items.iter().enumerate() {
            for atom in 0..g.num_atoms {
                let slot = i * n + atom;
                features[slot * ATOM_FEATURES..(slot + 1) * ATOM_FEATURES]
                    .copy_from_slice(g.atom(atom));
                mask[slot] = 1.0;
                for &nbr in &g.neighbors[atom] {
                    adjacency[slot * n + nbr] = 1.0;
                }
            }
        }

        let dag = self.with_dag.then(|| self.dag_batch(&items));

        GraphBatch {
            atom_features: Tensor::from_data(
                TensorData::new(features, [batch_size, n, ATOM_FEATURES]),
                &self.device,
            ),
            adjacency: Tensor::from_data(
                TensorData::new(adjacency, [batch_size, n, n]),
                &self.device,
            ),
            atom_mask: Tensor::from_data(
                TensorData::new(mask, [batch_size, n, 1]),
                &self.device,
            ),
            dag,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::featurizer::{Featurizer, FeaturizerConfig, OversizePolicy};
    use crate::data::smiles::MoleculeParser;
    use crate::domain::features::ModelKind;
    use crate::domain::molecule::ParsedMolecule;

    type TestBackend = burn::backend::NdArray;

    fn features(smiles: &[&str], kind: ModelKind) -> Vec<GraphFeatures> {
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
        Featurizer::new(FeaturizerConfig { max_atoms: 4, kind, policy: OversizePolicy::RejectBatch })
            .featurize(&parsed)
            .unwrap()
            .features
    }

    #[test]
    fn test_shapes_are_padded_to_max_atoms() {
        let batcher = GraphBatcher::<TestBackend>::new(Default::default(), 4, false);
        let batch = batcher.batch(features(&["CCO", "C"], ModelKind::GraphConv));
        assert_eq!(batch.atom_features.dims(), [2, 4, ATOM_FEATURES]);
        assert_eq!(batch.adjacency.dims(), [2, 4, 4]);
        assert_eq!(batch.atom_mask.dims(), [2, 4, 1]);
        assert!(batch.dag.is_none());

        let mask = batch.atom_mask.into_data().to_vec::<f32>().unwrap();
        assert_eq!(mask, vec![1.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_adjacency_is_symmetric() {
        let batcher = GraphBatcher::<TestBackend>::new(Default::default(), 4, false);
        let batch = batcher.batch(features(&["CCO"], ModelKind::GraphConv));
        let adj = batch.adjacency.into_data().to_vec::<f32>().unwrap();
        #[rustfmt::skip]
        let expected = vec![
            0.0, 1.0, 0.0, 0.0,
            1.0, 0.0, 1.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 0.0,
        ];
        assert_eq!(adj, expected);
    }

    #[test]
    fn test_dag_tensors() {
        let batcher = GraphBatcher::<TestBackend>::new(Default::default(), 4, true);
        let batch = batcher.batch(features(&["CCO"], ModelKind::Dag));
        let dag = batch.dag.unwrap();
        // 1 molecule × 4 roots; deepest level is 2 → 3 levels
        assert_eq!(dag.children.dims(), [4, 4, 4]);
        assert_eq!(dag.levels.dims(), [4, 4, 3]);

        let levels = dag.levels.into_data().to_vec::<f32>().unwrap();
        // Root 0: atom 0 at depth 0, atom 1 at depth 1, atom 2 at depth 2
        assert_eq!(&levels[0..9], &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        // Padding root 3 has no levels at all
        assert!(levels[27..36].iter().all(|&v| v == 0.0));
    }
}
