// ============================================================
// Layer 5 — Knowledge-Graph Completion Model
// ============================================================
// Scores every entity as the tail of (e1, rel, ?).
//
//   Embeddings:  E ∈ R^{|ent| × d},  R ∈ R^{|rel| × d}
//
//   Optional GCN encoder ("gcn_" model prefix), per layer:
//     h'_v = tanh( W_s h_v + Σ_{u→v} norm · W_m (h_u ∘ r_{u→v}) )
//
//   Decoders:
//     DistMult  s(h, r, t) = Σ h ∘ r ∘ t
//     ComplEx   s(h, r, t) = Re( Σ h ∘ r ∘ conj(t) ), with the
//               first / second half of each vector as the real /
//               imaginary part
//
//   Loss: binary cross-entropy against smoothed multi-hot targets
//   over all entities (1-N scoring).

use burn::{
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::{
        activation::{log_sigmoid, sigmoid, tanh},
        IndexingUpdateOp,
    },
};
use serde::{Deserialize, Serialize};

use crate::data::kg_graph::{Direction, MessageEdges};
use crate::domain::error::ArchitectureError;

// ─── Model selection ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KgcDecoder {
    DistMult,
    ComplEx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KgcModelKind {
    pub decoder:   KgcDecoder,
    pub gcn:       bool,
    pub direction: Direction,
}

impl KgcModelKind {
    /// Parse a model name such as "distmult" or "gcn_complex"
    /// together with a direction option.
    pub fn parse(model: &str, direction: &str) -> Result<Self, ArchitectureError> {
        let lowered = model.to_ascii_lowercase();
        let (gcn, base) = match lowered.strip_prefix("gcn_") {
            Some(rest) => (true, rest),
            None => (false, lowered.as_str()),
        };

        let decoder = match base {
            "distmult" => KgcDecoder::DistMult,
            "complex" => KgcDecoder::ComplEx,
            "conve" => return Err(not_implemented("kgc model", model)),
            _ if lowered.starts_with("ggnn_") || lowered.starts_with("gat_") => {
                return Err(not_implemented("kgc model", model))
            }
            _ => {
                return Err(ArchitectureError::Unknown {
                    component: "kgc model",
                    name:      model.to_string(),
                    expected:  "distmult, complex, gcn_distmult, gcn_complex",
                })
            }
        };

        let direction = match direction.to_ascii_lowercase().as_str() {
            "undirected" => Direction::Undirected,
            "uni" => Direction::Uni,
            "bi_fuse" | "bi_sep" => return Err(not_implemented("direction option", direction)),
            _ => {
                return Err(ArchitectureError::Unknown {
                    component: "direction option",
                    name:      direction.to_string(),
                    expected:  "undirected, uni",
                })
            }
        };

        Ok(Self { decoder, gcn, direction })
    }

    pub fn is_complex(&self) -> bool {
        self.decoder == KgcDecoder::ComplEx
    }
}

fn not_implemented(component: &'static str, name: &str) -> ArchitectureError {
    ArchitectureError::NotImplemented { component, name: name.to_string() }
}

// ─── Graph tensors ───────────────────────────────────────────────────────────

/// Message-passing edges on a device.
#[derive(Debug, Clone)]
pub struct KgGraphTensors<B: Backend> {
    pub src:      Tensor<B, 1, Int>,
    pub dst:      Tensor<B, 1, Int>,
    pub relation: Tensor<B, 1, Int>,
    /// [edges, 1] mean-aggregation weights.
    pub norm:     Tensor<B, 2>,
}

impl<B: Backend> KgGraphTensors<B> {
    /// `None` when the graph has no edges.
    pub fn from_edges(edges: &MessageEdges, device: &B::Device) -> Option<Self> {
        if edges.is_empty() {
            return None;
        }
        let n = edges.len();
        let ints = |v: &[usize]| {
            let flat: Vec<i32> = v.iter().map(|&x| x as i32).collect();
            Tensor::<B, 1, Int>::from_ints(TensorData::new(flat, [n]), device)
        };
        Some(Self {
            src:      ints(&edges.src),
            dst:      ints(&edges.dst),
            relation: ints(&edges.relation),
            norm:     Tensor::<B, 2>::from_floats(TensorData::new(edges.norm.clone(), [n, 1]), device),
        })
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct KgcModelConfig {
    pub num_entities:  usize,
    pub num_relations: usize,
    pub embedding_dim: usize,
    pub decoder:       KgcDecoder,
    #[config(default = 0)]
    pub gcn_layers:    usize,
    #[config(default = 0.2)]
    pub input_drop:    f64,
    #[config(default = 0.3)]
    pub hidden_drop:   f64,
}

impl KgcModelConfig {
    /// Glorot-style bound for a `[rows, cols]` table.
    fn glorot(rows: usize, cols: usize) -> Initializer {
        let bound = (6.0 / (rows + cols) as f64).sqrt();
        Initializer::Uniform { min: -bound, max: bound }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> KgcModel<B> {
        let d = self.embedding_dim;
        let entity_emb = EmbeddingConfig::new(self.num_entities, d)
            .with_initializer(Self::glorot(self.num_entities, d))
            .init(device);
        let relation_emb = EmbeddingConfig::new(self.num_relations, d)
            .with_initializer(Self::glorot(self.num_relations, d))
            .init(device);
        let gcn = (0..self.gcn_layers)
            .map(|_| KgGraphConv {
                self_loop: LinearConfig::new(d, d).init(device),
                message:   LinearConfig::new(d, d).with_bias(false).init(device),
            })
            .collect();

        KgcModel {
            entity_emb,
            relation_emb,
            gcn,
            input_drop: DropoutConfig::new(self.input_drop).init(),
            hidden_drop: DropoutConfig::new(self.hidden_drop).init(),
            complex: self.decoder == KgcDecoder::ComplEx,
        }
    }
}

// ─── Modules ─────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct KgGraphConv<B: Backend> {
    pub self_loop: Linear<B>,
    pub message:   Linear<B>,
}

impl<B: Backend> KgGraphConv<B> {
    /// entities: [E, d], relations: [R, d] → [E, d]
    pub fn forward(&self, entities: Tensor<B, 2>, relations: Tensor<B, 2>, graph: &KgGraphTensors<B>) -> Tensor<B, 2> {
        let h_src = entities.clone().select(0, graph.src.clone());
        let r = relations.select(0, graph.relation.clone());
        let msg = self.message.forward(h_src * r) * graph.norm.clone();

        let aggregated = entities
            .zeros_like()
            .select_assign(0, graph.dst.clone(), msg, IndexingUpdateOp::Add);
        tanh(self.self_loop.forward(entities) + aggregated)
    }
}

#[derive(Module, Debug)]
pub struct KgcModel<B: Backend> {
    pub entity_emb:   Embedding<B>,
    pub relation_emb: Embedding<B>,
    pub gcn:          Vec<KgGraphConv<B>>,
    pub input_drop:   Dropout,
    pub hidden_drop:  Dropout,
    pub complex:      bool,
}

impl<B: Backend> KgcModel<B> {
    pub fn num_entities(&self) -> usize {
        self.entity_emb.weight.val().dims()[0]
    }

    /// Entity table after the optional GCN layers.
    pub fn entity_states(&self, graph: Option<&KgGraphTensors<B>>) -> Tensor<B, 2> {
        let mut entities = self.entity_emb.weight.val();
        if let Some(graph) = graph {
            let relations = self.relation_emb.weight.val();
            for layer in &self.gcn {
                entities = layer.forward(entities, relations.clone(), graph);
            }
        }
        entities
    }

    /// Raw scores for every candidate tail — shape: [batch, num_entities]
    pub fn forward(
        &self,
        e1:    Tensor<B, 1, Int>,
        rel:   Tensor<B, 1, Int>,
        graph: Option<&KgGraphTensors<B>>,
    ) -> Tensor<B, 2> {
        let entities = self.entity_states(graph);
        let h = self.input_drop.forward(entities.clone().select(0, e1));
        let r = self.input_drop.forward(self.relation_emb.weight.val().select(0, rel));

        if self.complex {
            let [_, d] = h.dims();
            let half = d / 2;
            let split = |t: Tensor<B, 2>| (t.clone().narrow(1, 0, half), t.narrow(1, half, half));
            let (h_re, h_im) = split(h);
            let (r_re, r_im) = split(r);
            let (e_re, e_im) = split(entities);

            let q_re = self.hidden_drop.forward(h_re.clone() * r_re.clone() - h_im.clone() * r_im.clone());
            let q_im = self.hidden_drop.forward(h_re * r_im + h_im * r_re);
            q_re.matmul(e_re.transpose()) + q_im.matmul(e_im.transpose())
        } else {
            self.hidden_drop.forward(h * r).matmul(entities.transpose())
        }
    }

    /// Tail probabilities — shape: [batch, num_entities]
    pub fn predict(
        &self,
        e1:    Tensor<B, 1, Int>,
        rel:   Tensor<B, 1, Int>,
        graph: Option<&KgGraphTensors<B>>,
    ) -> Tensor<B, 2> {
        sigmoid(self.forward(e1, rel, graph))
    }

    /// Mean binary cross-entropy against `targets` in [0, 1].
    pub fn forward_loss(
        &self,
        e1:      Tensor<B, 1, Int>,
        rel:     Tensor<B, 1, Int>,
        targets: Tensor<B, 2>,
        graph:   Option<&KgGraphTensors<B>>,
    ) -> Tensor<B, 1> {
        let logits = self.forward(e1, rel, graph);
        let positive = targets.clone() * log_sigmoid(logits.clone());
        let negative = targets.neg().add_scalar(1.0) * log_sigmoid(logits.neg());
        (positive + negative).mean().neg()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::KgSample;
    use crate::data::kg_graph::KgGraph;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_parse_supported_models() {
        let k = KgcModelKind::parse("gcn_distmult", "undirected").unwrap();
        assert!(k.gcn);
        assert_eq!(k.decoder, KgcDecoder::DistMult);
        assert_eq!(k.direction, Direction::Undirected);

        let k = KgcModelKind::parse("ComplEx", "uni").unwrap();
        assert!(!k.gcn && k.is_complex());
        assert_eq!(k.direction, Direction::Uni);
    }

    #[test]
    fn test_parse_rejects_unsupported() {
        for name in ["conve", "ggnn_distmult", "gcn_conve"] {
            assert!(
                matches!(KgcModelKind::parse(name, "uni"), Err(ArchitectureError::NotImplemented { .. })),
                "{name}"
            );
        }
        assert!(matches!(
            KgcModelKind::parse("distmult", "bi_fuse"),
            Err(ArchitectureError::NotImplemented { .. })
        ));
        assert!(matches!(KgcModelKind::parse("transe", "uni"), Err(ArchitectureError::Unknown { .. })));
    }

    fn ids(v: &[i32]) -> Tensor<TestBackend, 1, Int> {
        Tensor::from_ints(v, &Default::default())
    }

    #[test]
    fn test_distmult_scores_every_entity() {
        let model = KgcModelConfig::new(10, 4, 6, KgcDecoder::DistMult).init::<TestBackend>(&Default::default());
        let scores = model.forward(ids(&[4, 5]), ids(&[1, 2]), None);
        assert_eq!(scores.dims(), [2, 10]);
        let p: Vec<f32> = model.predict(ids(&[4]), ids(&[1]), None).into_data().iter::<f32>().collect();
        assert!(p.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn test_gcn_complex_loss_is_finite() {
        let device = Default::default();
        let model = KgcModelConfig::new(8, 3, 4, KgcDecoder::ComplEx)
            .with_gcn_layers(1)
            .init::<TestBackend>(&device);
        let sample = KgSample { e1: 4, rel: 1, e2: None, rel_eval: None, e2_multi1: vec![5, 6], e2_multi2: vec![] };
        let graph = KgGraph::from_samples(&[sample], 8, 3);
        let tensors = KgGraphTensors::<TestBackend>::from_edges(&graph.message_edges(Direction::Undirected), &device);
        assert!(tensors.is_some());

        let states = model.entity_states(tensors.as_ref());
        assert_eq!(states.dims(), [8, 4]);

        let targets = Tensor::<TestBackend, 2>::zeros([1, 8], &device).add_scalar(0.125);
        let loss: f32 = model.forward_loss(ids(&[4]), ids(&[1]), targets, tensors.as_ref()).into_scalar();
        assert!(loss.is_finite() && loss > 0.0);
    }

    #[test]
    fn test_empty_graph_has_no_tensors() {
        let g = KgGraph { num_entities: 4, num_relations: 1, edges: vec![] };
        assert!(KgGraphTensors::<TestBackend>::from_edges(&g.message_edges(Direction::Uni), &Default::default()).is_none());
    }
}
