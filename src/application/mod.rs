// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: each use case wires the data,
// ml and infra layers together for one subcommand. No model
// math and no printing of results (that is Layer 1).

/// Nested JSON run configuration
pub mod config;

/// Graph-to-tree training on math word problems
pub mod mawps_train_use_case;

/// KG completion training
pub mod kgc_train_use_case;

/// KG completion inference from a checkpoint
pub mod kgc_infer_use_case;
