// ============================================================
// Layer 3 — Feature Representation
// ============================================================
// The numeric view of one molecule that the model consumes.
//
//   atom_features — row-major [num_atoms × ATOM_FEATURES]
//   neighbors     — adjacency list, one entry per atom
//   dag           — only for the DAG model family: for every
//                   root atom, the breadth-first depth of each
//                   atom and the parent → child edges of the
//                   DAG rooted there
//
// Shapes are per-molecule here; padding to the model's
// max_atoms happens in the batcher (Layer 4), so this type
// stays free of any tensor library.

use serde::{Deserialize, Serialize};

/// The two model families. Both read the same atom features;
/// the DAG family also needs the per-root DAG structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    GraphConv,
    Dag,
}

impl ModelKind {
    /// Human-readable name, used in logs.
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::GraphConv => "Graph Convolution",
            ModelKind::Dag       => "DAG",
        }
    }

    /// Prefix of output file names.
    pub fn output_prefix(&self) -> &'static str {
        match self {
            ModelKind::GraphConv => "PredictedGraphConvolution",
            ModelKind::Dag       => "PredictedDAG",
        }
    }

    pub fn needs_dag(&self) -> bool {
        matches!(self, ModelKind::Dag)
    }
}

/// Width of the per-atom feature vector.
pub const ATOM_FEATURES: usize = 75;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphFeatures {
    pub num_atoms:     usize,
    pub atom_features: Vec<f32>,
    pub neighbors:     Vec<Vec<usize>>,
    pub dag:           Option<DagStructure>,
}

impl GraphFeatures {
    /// Feature row for one atom.
    pub fn atom(&self, idx: usize) -> &[f32] {
        &self.atom_features[idx * ATOM_FEATURES..(idx + 1) * ATOM_FEATURES]
    }
}

/// Per-root DAGs over a molecule graph.
///
/// `depths[root][atom]` is the BFS distance from `root`, or None when
/// `atom` sits in a different connected component.
/// `edges[root]` lists (parent, child) pairs where child is one step
/// further from the root than parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DagStructure {
    pub depths: Vec<Vec<Option<usize>>>,
    pub edges:  Vec<Vec<(usize, usize)>>,
}

impl DagStructure {
    /// Deepest level reached from any root.
    pub fn max_depth(&self) -> usize {
        self.depths
            .iter()
            .flat_map(|row| row.iter().flatten())
            .copied()
            .max()
            .unwrap_or(0)
    }
}
