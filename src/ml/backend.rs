// ============================================================
// Layer 5 — Backend Aliases
// ============================================================
// Training runs on Autodiff<Wgpu>; `model.valid()` and the
// inference entry point run on the inner Wgpu backend, so every
// evaluation batcher is built for InferBackend as well.

pub type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type InferBackend = burn::backend::Wgpu;
