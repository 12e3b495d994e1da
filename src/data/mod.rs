// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// From the input CSV to padded tensor batches:
//
//   To_predict.csv
//       │
//       ▼
//   InputReader       → InputTable (headers + rows)
//       │
//       ▼
//   MoleculeParser    → Molecule per valid SMILES
//       │
//       ▼
//   Featurizer        → GraphFeatures (75 features per atom,
//       │                adjacency, optional DAGs)
//       ▼
//   GraphDataset      → implements Burn's Dataset trait
//       │
//       ▼
//   GraphBatcher      → padded tensors for the models
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads the input table with the csv crate
pub mod loader;

/// SMILES → Molecule
pub mod smiles;

/// Molecule → GraphFeatures
pub mod featurizer;

/// Implements Burn's Dataset trait over features
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
