// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All model architectures, training loops and inference code.
//
//   Graph-to-tree (math word problems):
//
//     graph_encoder.rs  — GCN / RGCN layers over batch adjacency
//     graph2tree.rs     — node embedding + encoder + attention
//                         decoder with optional copy mechanism
//     decoding.rs       — greedy and beam-search decoding
//     mawps_trainer.rs  — training loop, tree-accuracy evaluation,
//                         best-model retention
//
//   KG completion:
//
//     kgc_model.rs      — entity / relation embeddings, optional
//                         GCN encoder, DistMult / ComplEx scoring
//     kgc_evaluator.rs  — filtered ranking over dev / test
//     kgc_trainer.rs    — 1-N BCE training loop
//     kgc_inferencer.rs — ad hoc tail prediction from a checkpoint
//
//   backend.rs          — Autodiff<Wgpu> / Wgpu aliases

/// Training and inference backend aliases
pub mod backend;

/// Graph convolution encoders
pub mod graph_encoder;

/// Graph-to-tree model
pub mod graph2tree;

/// Greedy and beam-search decoding
pub mod decoding;

/// Graph-to-tree training loop
pub mod mawps_trainer;

/// KG completion model
pub mod kgc_model;

/// Filtered ranking evaluation
pub mod kgc_evaluator;

/// KG completion training loop
pub mod kgc_trainer;

/// KG completion inference adapter
pub mod kgc_inferencer;
