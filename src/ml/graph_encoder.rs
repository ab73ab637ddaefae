// ============================================================
// Layer 5 — Graph Encoder
// ============================================================
// Stacked graph convolutions over the batch adjacency built by
// Graph2TreeBatcher.
//
//   GCN   h' = relu( Â H W )                         Â: [B, 1, N, N]
//   RGCN  h' = relu( H W_0 + Σ_r A_r H W_r )         A: [B, R, N, N]
//
// Â and A_r are already normalised on the host (see
// data/batcher.rs), so a layer is only matmuls and a ReLU.
//
// Only these two encoders exist. "gat", "ggnn" and "graphsage"
// are recognised but rejected when the config is validated.

use burn::{
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::relu,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::error::ArchitectureError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphEmbeddingKind {
    Gcn,
    Rgcn,
}

impl FromStr for GraphEmbeddingKind {
    type Err = ArchitectureError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "gcn" => Ok(Self::Gcn),
            "rgcn" => Ok(Self::Rgcn),
            "gat" | "ggnn" | "graphsage" => Err(ArchitectureError::NotImplemented {
                component: "graph embedding",
                name:      name.to_string(),
            }),
            _ => Err(ArchitectureError::Unknown {
                component: "graph embedding",
                name:      name.to_string(),
                expected:  "gcn, rgcn",
            }),
        }
    }
}

#[derive(Config, Debug)]
pub struct GraphEncoderConfig {
    pub kind:          GraphEmbeddingKind,
    pub input_size:    usize,
    pub hidden_size:   usize,
    pub num_layers:    usize,
    /// Adjacency channels; ignored by GCN.
    pub num_relations: usize,
    #[config(default = 0.0)]
    pub feat_drop:     f64,
    #[config(default = 0.08)]
    pub init_weight:   f64,
}

impl GraphEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GraphEncoder<B> {
        let layers = (0..self.num_layers.max(1))
            .map(|i| {
                let d_in = if i == 0 { self.input_size } else { self.hidden_size };
                self.build_layer(d_in, device)
            })
            .collect();
        GraphEncoder { layers }
    }

    fn linear<B: Backend>(&self, d_in: usize, bias: bool, device: &B::Device) -> Linear<B> {
        LinearConfig::new(d_in, self.hidden_size)
            .with_bias(bias)
            .with_initializer(Initializer::Uniform { min: -self.init_weight, max: self.init_weight })
            .init(device)
    }

    fn build_layer<B: Backend>(&self, d_in: usize, device: &B::Device) -> GraphConvLayer<B> {
        let (self_loop, n_rel) = match self.kind {
            GraphEmbeddingKind::Gcn => (None, 1),
            GraphEmbeddingKind::Rgcn => (Some(self.linear(d_in, true, device)), self.num_relations.max(1)),
        };
        let relations = (0..n_rel)
            .map(|_| self.linear(d_in, self.kind == GraphEmbeddingKind::Gcn, device))
            .collect();
        GraphConvLayer {
            self_loop,
            relations,
            dropout: DropoutConfig::new(self.feat_drop).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct GraphConvLayer<B: Backend> {
    pub self_loop: Option<Linear<B>>,
    /// One projection per adjacency channel.
    pub relations: Vec<Linear<B>>,
    pub dropout:   Dropout,
}

impl<B: Backend> GraphConvLayer<B> {
    /// x: [batch, nodes, d_in], adjacency: [batch, R, nodes, nodes]
    pub fn forward(&self, x: Tensor<B, 3>, adjacency: Tensor<B, 4>) -> Tensor<B, 3> {
        let x = self.dropout.forward(x);
        let mut out = self.self_loop.as_ref().map(|w| w.forward(x.clone()));

        for (r, w) in self.relations.iter().enumerate() {
            let a_r: Tensor<B, 3> = adjacency.clone().narrow(1, r, 1).squeeze_dim(1);
            let msg = a_r.matmul(w.forward(x.clone()));
            out = Some(match out {
                Some(acc) => acc + msg,
                None => msg,
            });
        }

        match out {
            Some(h) => relu(h),
            None => x,
        }
    }
}

#[derive(Module, Debug)]
pub struct GraphEncoder<B: Backend> {
    pub layers: Vec<GraphConvLayer<B>>,
}

impl<B: Backend> GraphEncoder<B> {
    pub fn forward(&self, mut x: Tensor<B, 3>, adjacency: Tensor<B, 4>) -> Tensor<B, 3> {
        for layer in &self.layers {
            x = layer.forward(x, adjacency.clone());
        }
        x
    }
}
