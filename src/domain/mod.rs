// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and functions that define the core
// concepts shared by both pipelines (MWP and KG completion).
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O or network calls
//   - Only plain Rust structs, enums, traits and functions
//
// Everything in here is unit tested without a tensor backend.

// Symbol <-> index mappings and the per-batch extension vocabulary
pub mod vocab;

// Pre-built input graphs (nodes, labelled edges, sentence fragments)
pub mod graph;

// MWP examples and KG triple records as they appear on disk
pub mod example;

// Parenthesis repair and tree accuracy for decoded expressions
pub mod tree;

// Filtered ranking metrics for link prediction
pub mod ranking;

// Evaluation cadence and best-model retention
pub mod best_model;

// Typed errors for closed-set selections and training edge cases
pub mod error;

// Core abstractions that other layers implement
pub mod traits;
