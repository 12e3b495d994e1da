// ============================================================
// Layer 4 — Graph Featurizer
// ============================================================
// Converts parsed molecules into the GraphFeatures the model
// reads. Order is preserved: output i belongs to the i-th
// kept input molecule, and `rows` records its input row.
//
// Per-atom feature layout (75 values, the ConvMol layout):
//
//   [ 0..44)  element one-hot (43 elements + "unknown")
//   [44..55)  degree one-hot, 0..=10
//   [55..62)  implicit valence one-hot, 0..=6
//   [62]      formal charge
//   [63]      radical electrons
//   [64..69)  hybridization one-hot: SP SP2 SP3 SP3D SP3D2
//   [69]      aromatic flag
//   [70..75)  total hydrogen one-hot, 0..=4
//
// The model input has a fixed atom dimension (`max_atoms`).
// What happens to a molecule that is too large is decided by
// OversizePolicy, never implicitly:
//
//   RejectBatch  — the whole run fails with FeaturizationError
//   SkipMolecule — that molecule is left out and reported
//
// For the DAG model family, each molecule also gets one DAG
// per root atom (breadth-first depths and parent → child
// edges), the equivalent of a DAG transform with max_atoms.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::error::FeaturizationError;
use crate::domain::features::{DagStructure, GraphFeatures, ModelKind, ATOM_FEATURES};
use crate::domain::molecule::{Atom, BondOrder, Element, Molecule, ParsedMolecule};

const ELEMENT_VOCAB: [Element; 43] = [
    Element::C, Element::N, Element::O, Element::S, Element::F, Element::Si,
    Element::P, Element::Cl, Element::Br, Element::Mg, Element::Na, Element::Ca,
    Element::Fe, Element::As, Element::Al, Element::I, Element::B, Element::V,
    Element::K, Element::Tl, Element::Yb, Element::Sb, Element::Sn, Element::Ag,
    Element::Pd, Element::Co, Element::Se, Element::Ti, Element::Zn, Element::H,
    Element::Li, Element::Ge, Element::Cu, Element::Au, Element::Ni, Element::Cd,
    Element::In, Element::Mn, Element::Zr, Element::Cr, Element::Pt, Element::Hg,
    Element::Pb,
];

const ELEMENT_SLOTS:  usize = ELEMENT_VOCAB.len() + 1;
const DEGREE_SLOTS:   usize = 11;
const IMPLICIT_SLOTS: usize = 7;
const HYBRID_SLOTS:   usize = 5;
const HYDROGEN_SLOTS: usize = 5;

const DEGREE_OFFSET:   usize = ELEMENT_SLOTS;
const IMPLICIT_OFFSET: usize = DEGREE_OFFSET + DEGREE_SLOTS;
const CHARGE_OFFSET:   usize = IMPLICIT_OFFSET + IMPLICIT_SLOTS;
const RADICAL_OFFSET:  usize = CHARGE_OFFSET + 1;
const HYBRID_OFFSET:   usize = RADICAL_OFFSET + 1;
const AROMATIC_OFFSET: usize = HYBRID_OFFSET + HYBRID_SLOTS;
const HYDROGEN_OFFSET: usize = AROMATIC_OFFSET + 1;

const _: () = assert!(HYDROGEN_OFFSET + HYDROGEN_SLOTS == ATOM_FEATURES);

/// What to do with a molecule that exceeds `max_atoms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OversizePolicy {
    #[default]
    RejectBatch,
    SkipMolecule,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturizerConfig {
    pub max_atoms: usize,
    pub kind:      ModelKind,
    pub policy:    OversizePolicy,
}

/// A molecule left out under `OversizePolicy::SkipMolecule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedMolecule {
    pub row:    usize,
    pub smiles: String,
    pub atoms:  usize,
}

/// Featurizer output, aligned by index: `features[i]` came from
/// input row `rows[i]`.
#[derive(Debug, Clone, Default)]
pub struct Featurized {
    pub features: Vec<GraphFeatures>,
    pub rows:     Vec<usize>,
    pub skipped:  Vec<SkippedMolecule>,
}

pub struct Featurizer {
    config: FeaturizerConfig,
}

impl Featurizer {
    pub fn new(config: FeaturizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeaturizerConfig {
        &self.config
    }

    /// Featurize every molecule, in order. An empty input gives an
    /// empty output.
    pub fn featurize(&self, molecules: &[ParsedMolecule]) -> Result<Featurized, FeaturizationError> {
        let mut out = Featurized::default();

        for parsed in molecules {
            let atoms = parsed.molecule.atom_count();
            if atoms > self.config.max_atoms {
                match self.config.policy {
                    OversizePolicy::RejectBatch => {
                        return Err(FeaturizationError::TooManyAtoms {
                            row:       parsed.row,
                            atoms,
                            max_atoms: self.config.max_atoms,
                        });
                    }
                    OversizePolicy::SkipMolecule => {
                        tracing::warn!(
                            "Skipping row {} ({} atoms > max_atoms {})",
                            parsed.row, atoms, self.config.max_atoms
                        );
                        out.skipped.push(SkippedMolecule {
                            row:    parsed.row,
                            smiles: parsed.smiles.clone(),
                            atoms,
                        });
                        continue;
                    }
                }
            }

            out.features.push(self.featurize_one(&parsed.molecule));
            out.rows.push(parsed.row);
        }

        tracing::debug!(
            "Featurized {} molecules ({} skipped)",
            out.features.len(),
            out.skipped.len()
        );
        Ok(out)
    }

    fn featurize_one(&self, mol: &Molecule) -> GraphFeatures {
        let neighbors = mol.adjacency();
        let mut atom_features = Vec::with_capacity(mol.atom_count() * ATOM_FEATURES);
        for (idx, atom) in mol.atoms.iter().enumerate() {
            atom_features.extend_from_slice(&atom_features_of(mol, idx, atom, neighbors[idx].len()));
        }

        let dag = self.config.kind.needs_dag().then(|| build_dags(&neighbors));

        GraphFeatures {
            num_atoms: mol.atom_count(),
            atom_features,
            neighbors,
            dag,
        }
    }
}

fn one_hot(row: &mut [f32; ATOM_FEATURES], offset: usize, slots: usize, value: usize) {
    row[offset + value.min(slots - 1)] = 1.0;
}

fn atom_features_of(mol: &Molecule, idx: usize, atom: &Atom, degree: usize) -> [f32; ATOM_FEATURES] {
    let mut row = [0.0f32; ATOM_FEATURES];

    let element_slot = ELEMENT_VOCAB
        .iter()
        .position(|e| *e == atom.element)
        .unwrap_or(ELEMENT_VOCAB.len());
    row[element_slot] = 1.0;

    one_hot(&mut row, DEGREE_OFFSET, DEGREE_SLOTS, degree);
    one_hot(&mut row, IMPLICIT_OFFSET, IMPLICIT_SLOTS, atom.implicit_hydrogens() as usize);
    row[CHARGE_OFFSET] = atom.charge as f32;
    row[RADICAL_OFFSET] = atom.radical_electrons as f32;
    if let Some(h) = hybridization(mol, idx, atom, degree) {
        row[HYBRID_OFFSET + h] = 1.0;
    }
    row[AROMATIC_OFFSET] = if atom.aromatic { 1.0 } else { 0.0 };
    one_hot(&mut row, HYDROGEN_OFFSET, HYDROGEN_SLOTS, atom.hydrogens as usize);

    row
}

/// Hybridization slot (0 = SP … 4 = SP3D2) from bond orders and
/// steric number. None for a bare ion with nothing attached.
fn hybridization(mol: &Molecule, idx: usize, atom: &Atom, degree: usize) -> Option<usize> {
    let steric = degree + atom.hydrogens as usize;
    if steric == 0 {
        return None;
    }

    let (mut doubles, mut triples) = (0, 0);
    for bond in mol.bonds_of(idx) {
        match bond.order {
            BondOrder::Double => doubles += 1,
            BondOrder::Triple | BondOrder::Quadruple => triples += 1,
            _ => {}
        }
    }

    Some(if triples > 0 || doubles >= 2 {
        0
    } else if doubles == 1 || atom.aromatic {
        1
    } else {
        match steric {
            0..=4 => 2,
            5 => 3,
            _ => 4,
        }
    })
}

/// One breadth-first DAG per root atom.
fn build_dags(neighbors: &[Vec<usize>]) -> DagStructure {
    let n = neighbors.len();
    let mut depths = Vec::with_capacity(n);
    let mut edges = Vec::with_capacity(n);

    for root in 0..n {
        let mut depth: Vec<Option<usize>> = vec![None; n];
        depth[root] = Some(0);
        let mut queue = VecDeque::from([root]);
        let mut root_edges = Vec::new();

        while let Some(u) = queue.pop_front() {
            let du = depth[u].unwrap_or(0);
            for &v in &neighbors[u] {
                match depth[v] {
                    None => {
                        depth[v] = Some(du + 1);
                        root_edges.push((u, v));
                        queue.push_back(v);
                    }
                    // A second shortest path into v (ring closure).
                    Some(dv) if dv == du + 1 => root_edges.push((u, v)),
                    Some(_) => {}
                }
            }
        }

        depths.push(depth);
        edges.push(root_edges);
    }

    DagStructure { depths, edges }
}
