// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that define what the
// system works with:
//
//   molecule — atoms, bonds, the Molecule graph
//   features — the numeric representation a model reads
//   record   — input rows, output rows, result tables
//   error    — the failure taxonomy and pipeline stages
//   traits   — the predictor and sink seams
//
// Rules for this layer:
//   - NO Burn types
//   - NO file I/O
//   - Only data and the contracts between layers

pub mod molecule;

pub mod features;

pub mod record;

pub mod error;

pub mod traits;
