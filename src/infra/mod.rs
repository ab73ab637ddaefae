// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns shared by both drivers:
//
//   runtime.rs        — once-per-process device / seed / worker
//                       setup, run before any data loader
//
//   config_loader.rs  — reads the nested JSON config passed with
//                       --json-config and logs the effective values
//
//   checkpoint.rs     — CompactRecorder weights plus JSON side
//                       files (config, vocabularies, KG graph)
//
//   metrics.rs        — per-epoch CSV log next to the checkpoint

/// Device selection, seeding and loader worker policy
pub mod runtime;

/// JSON configuration file loading
pub mod config_loader;

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
