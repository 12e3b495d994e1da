// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: these modules call into the
// data, ml and infra layers in order and turn their errors
// into a PipelineFailure tagged with the failing stage.
//
// No printing here (that's Layer 1) and no tensor code
// (that's Layer 5).
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The prediction job
pub mod predict_use_case;

// The parse-only input check
pub mod check_use_case;
