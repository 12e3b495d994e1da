// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The only layer with model code:
//
//   model.rs      — GraphConvModel and DagModel, their Burn
//                   configs, and the JSON ModelManifest that
//                   describes a saved artifact
//
//   inferencer.rs — loads an artifact and implements
//                   ScorePredictor over the NdArray backend,
//                   in fixed-size mini-batches, order kept
//
// Reference: Burn Book §3 (Building Blocks: Module, Config)

pub mod model;

pub mod inferencer;
