// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from dataset files to tensor batches.
//
// MWP (graph-to-tree):
//
//   *.jsonl  ──▶ MawpsLoader ──▶ MwpVocabBuilder ──▶ MwpDataset
//                                                      │
//                          Graph2TreeBatcher ◀─────────┘
//                          (per-batch extended vocabulary)
//
// KG completion:
//
//   e1rel_to_e2_*.json ──▶ KgLoader ──▶ build_kg_vocab ──▶ KgDataset
//                                                            │
//                               KgGraph, KgBatcher ◀─────────┘

/// JSON-lines loader for pre-built MWP graphs
pub mod loader;

/// JSON-lines loader for KG completion records
pub mod kg_loader;

/// Whitespace tokenisation and case policy
pub mod preprocessor;

/// Vocabulary construction from training data
pub mod vocab_builder;

/// Per-batch vocabulary extension for the copy mechanism
pub mod ext_vocab;

/// Burn Dataset implementations
pub mod dataset;

/// Graph-to-tree tensor batches
pub mod batcher;

/// KG background graph for GCN encoders
pub mod kg_graph;

/// KG completion tensor batches
pub mod kg_batcher;

/// Seeded train/validation split
pub mod splitter;
