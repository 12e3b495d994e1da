// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Filesystem and process-wide concerns used by the layers
// above:
//
//   checkpoint.rs    — ModelStore: reads the model artifact
//                      (JSON manifest + CompactRecorder
//                      weights) and can write one
//
//   result_writer.rs — ResultWriter: timestamped, never-
//                      overwriting CSV output
//
//   logging.rs       — tracing subscriber setup
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model artifact loading and saving
pub mod checkpoint;

/// CSV result persistence
pub mod result_writer;

/// tracing subscriber initialisation
pub mod logging;
