// ============================================================
// Layer 5 — Graph-to-Tree Model
// ============================================================
// Encodes an AMR graph and decodes the linearised expression
// tree symbol by symbol.
//
//   node ids ──▶ Embedding ──▶ GraphEncoder ──▶ memory [B, N, D]
//                                                   │
//   <s> y1 .. ──▶ Embedding + sinusoids ──▶ DecoderBlock × L
//                                (causal self-attn, cross-attn
//                                 over memory, feed-forward)
//                                                   │
//                                      Generator ──▶ P_vocab
//
// Copy mechanism (pointer-generator), when enabled:
//
//   p_gen   = σ( W_g [h ; c] )            h: decoder state
//                                          c: cross-attn context
//   P(w)    = p_gen · P_vocab(w)
//           + (1 - p_gen) · Σ_{i: node_i = w} α_i
//
// α are the last block's cross-attention weights averaged over
// heads. The sum runs over the batch's extended vocabulary, so
// node tokens outside the base vocabulary can still be emitted.
//
// Every linear, embedding and attention weight is drawn from
// U(-init_weight, init_weight); layer norms keep unit gain.

use burn::{
    nn::{
        attention::{
            generate_autoregressive_mask, MhaInput, MhaOutput, MultiHeadAttention,
            MultiHeadAttentionConfig,
        },
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Initializer,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        PositionalEncoding, PositionalEncodingConfig,
    },
    prelude::*,
    tensor::{
        activation::{gelu, log_softmax, sigmoid, softmax},
        IndexingUpdateOp,
    },
};

use crate::data::batcher::Graph2TreeBatch;
use crate::ml::graph_encoder::{GraphEncoder, GraphEncoderConfig};

/// Floor applied before taking the log of mixed probabilities.
const MIN_PROB: f64 = 1e-12;

#[derive(Config, Debug)]
pub struct Graph2TreeConfig {
    pub in_vocab_size:  usize,
    pub out_vocab_size: usize,
    pub encoder:        GraphEncoderConfig,
    pub num_heads:      usize,
    pub num_layers:     usize,
    pub ff_size:        usize,
    /// Longest decoder input (including <s>) the model accepts.
    pub max_positions:  usize,
    #[config(default = 0.3)]
    pub dropout:        f64,
    #[config(default = false)]
    pub use_copy:       bool,
    #[config(default = 0.08)]
    pub init_weight:    f64,
}

impl Graph2TreeConfig {
    pub fn hidden_size(&self) -> usize {
        self.encoder.hidden_size
    }

    fn uniform(&self) -> Initializer {
        Initializer::Uniform { min: -self.init_weight, max: self.init_weight }
    }

    fn linear<B: Backend>(&self, d_in: usize, d_out: usize, device: &B::Device) -> Linear<B> {
        LinearConfig::new(d_in, d_out).with_initializer(self.uniform()).init(device)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Graph2Tree<B> {
        let d = self.hidden_size();
        let node_embedding = EmbeddingConfig::new(self.in_vocab_size, self.encoder.input_size)
            .with_initializer(self.uniform())
            .init(device);
        let encoder = self
            .encoder
            .clone()
            .with_init_weight(self.init_weight)
            .init(device);
        let tgt_embedding = EmbeddingConfig::new(self.out_vocab_size, d)
            .with_initializer(self.uniform())
            .init(device);
        let positions = PositionalEncodingConfig::new(d)
            .with_max_sequence_size(self.max_positions.max(1))
            .init(device);
        let layers = (0..self.num_layers.max(1))
            .map(|_| self.build_decoder_block(device))
            .collect();

        Graph2Tree {
            node_embedding,
            encoder,
            tgt_embedding,
            positions,
            layers,
            final_norm: LayerNormConfig::new(d).init(device),
            generator: self.linear(d, self.out_vocab_size, device),
            copy_gate: self.use_copy.then(|| self.linear(2 * d, 1, device)),
            dropout: DropoutConfig::new(self.dropout).init(),
            out_vocab_size: self.out_vocab_size,
        }
    }

    fn build_decoder_block<B: Backend>(&self, device: &B::Device) -> DecoderBlock<B> {
        let d = self.hidden_size();
        let attention = || {
            MultiHeadAttentionConfig::new(d, self.num_heads)
                .with_dropout(self.dropout)
                .with_initializer(self.uniform())
                .init(device)
        };
        DecoderBlock {
            self_attn:   attention(),
            cross_attn:  attention(),
            ffn_linear1: self.linear(d, self.ff_size, device),
            ffn_linear2: self.linear(self.ff_size, d, device),
            norm1:       LayerNormConfig::new(d).init(device),
            norm2:       LayerNormConfig::new(d).init(device),
            norm3:       LayerNormConfig::new(d).init(device),
            dropout:     DropoutConfig::new(self.dropout).init(),
        }
    }
}

// ─── Decoder block ───────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct DecoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub cross_attn:  MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub norm3:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> DecoderBlock<B> {
    /// Returns the block output and its cross-attention result.
    pub fn forward(
        &self,
        x:          Tensor<B, 3>,
        memory:     Tensor<B, 3>,
        causal:     Tensor<B, 3, Bool>,
        memory_pad: Tensor<B, 2, Bool>,
    ) -> (Tensor<B, 3>, MhaOutput<B>) {
        let attn = self
            .self_attn
            .forward(MhaInput::self_attn(x.clone()).mask_attn(causal))
            .context;
        let x = self.norm1.forward(x + self.dropout.forward(attn));

        let cross = self
            .cross_attn
            .forward(MhaInput::new(x.clone(), memory.clone(), memory).mask_pad(memory_pad));
        let x = self.norm2.forward(x + self.dropout.forward(cross.context.clone()));

        let ffn_out = self.ffn_linear2.forward(gelu(self.ffn_linear1.forward(x.clone())));
        (self.norm3.forward(x + self.dropout.forward(ffn_out)), cross)
    }
}

// ─── Model ───────────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct Graph2Tree<B: Backend> {
    pub node_embedding: Embedding<B>,
    pub encoder:        GraphEncoder<B>,
    pub tgt_embedding:  Embedding<B>,
    pub positions:      PositionalEncoding<B>,
    pub layers:         Vec<DecoderBlock<B>>,
    pub final_norm:     LayerNorm<B>,
    pub generator:      Linear<B>,
    pub copy_gate:      Option<Linear<B>>,
    pub dropout:        Dropout,
    pub out_vocab_size: usize,
}

/// Encoder output plus everything decoding needs from the batch.
#[derive(Debug, Clone)]
pub struct EncodedGraph<B: Backend> {
    pub memory:         Tensor<B, 3>,
    pub pad_mask:       Tensor<B, 2, Bool>,
    pub token_id_oov:   Option<Tensor<B, 2, Int>>,
    pub ext_vocab_size: usize,
}

impl<B: Backend> EncodedGraph<B> {
    /// Tile a single-graph encoding `k` times along the batch.
    pub fn repeat(&self, k: usize) -> Self {
        Self {
            memory:         self.memory.clone().repeat_dim(0, k),
            pad_mask:       self.pad_mask.clone().repeat_dim(0, k),
            token_id_oov:   self.token_id_oov.clone().map(|t| t.repeat_dim(0, k)),
            ext_vocab_size: self.ext_vocab_size,
        }
    }

    /// The encoding of graph `i` alone, as a batch of one.
    pub fn item(&self, i: usize) -> Self {
        Self {
            memory:         self.memory.clone().narrow(0, i, 1),
            pad_mask:       self.pad_mask.clone().narrow(0, i, 1),
            token_id_oov:   self.token_id_oov.clone().map(|t| t.narrow(0, i, 1)),
            ext_vocab_size: self.ext_vocab_size,
        }
    }
}

impl<B: Backend> Graph2Tree<B> {
    pub fn encode(
        &self,
        node_ids:       Tensor<B, 2, Int>,
        adjacency:      Tensor<B, 4>,
        pad_mask:       Tensor<B, 2, Bool>,
        token_id_oov:   Option<Tensor<B, 2, Int>>,
        ext_vocab_size: usize,
    ) -> EncodedGraph<B> {
        let x = self.dropout.forward(self.node_embedding.forward(node_ids));
        let memory = self.encoder.forward(x, adjacency);
        EncodedGraph { memory, pad_mask, token_id_oov, ext_vocab_size }
    }

    pub fn encode_batch(&self, batch: &Graph2TreeBatch<B>) -> EncodedGraph<B> {
        self.encode(
            batch.node_ids.clone(),
            batch.adjacency.clone(),
            batch.node_pad_mask.clone(),
            batch.token_id_oov.clone(),
            batch.ext_vocab_size,
        )
    }

    /// decoder_input: [batch, T] → log-probabilities [batch, T, E]
    /// where E is the extended vocabulary size with copy, else |V_out|.
    pub fn decode(&self, enc: &EncodedGraph<B>, decoder_input: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let [batch_size, steps] = decoder_input.dims();
        let device = decoder_input.device();

        let emb = self.tgt_embedding.forward(decoder_input);
        let mut x = self.dropout.forward(self.positions.forward(emb));
        let causal = generate_autoregressive_mask::<B>(batch_size, steps, &device);

        let mut cross = None;
        for layer in &self.layers {
            let (y, attn) = layer.forward(x, enc.memory.clone(), causal.clone(), enc.pad_mask.clone());
            x = y;
            cross = Some(attn);
        }
        let h = self.final_norm.forward(x);
        let logits = self.generator.forward(h.clone());

        match (&self.copy_gate, &enc.token_id_oov, cross) {
            (Some(gate), Some(oov), Some(cross)) => {
                self.mix_copy(gate, h, logits, cross, oov.clone(), enc.ext_vocab_size)
            }
            _ => log_softmax(logits, 2),
        }
    }

    fn mix_copy(
        &self,
        gate:           &Linear<B>,
        h:              Tensor<B, 3>,
        logits:         Tensor<B, 3>,
        cross:          MhaOutput<B>,
        token_id_oov:   Tensor<B, 2, Int>,
        ext_vocab_size: usize,
    ) -> Tensor<B, 3> {
        let [batch_size, steps, vocab_size] = logits.dims();
        let [_, nodes] = token_id_oov.dims();
        let device = logits.device();

        // [B, heads, T, N] → [B, T, N]
        let alpha: Tensor<B, 3> = cross.weights.mean_dim(1).squeeze_dim(1);
        let p_gen = sigmoid(gate.forward(Tensor::cat(vec![h, cross.context], 2)));

        let mut probs = softmax(logits, 2) * p_gen.clone();
        if ext_vocab_size > vocab_size {
            let extra = Tensor::<B, 3>::zeros([batch_size, steps, ext_vocab_size - vocab_size], &device);
            probs = Tensor::cat(vec![probs, extra], 2);
        }

        let index = token_id_oov.unsqueeze_dim::<3>(1).expand([batch_size, steps, nodes]);
        let copied = alpha * p_gen.neg().add_scalar(1.0);
        probs
            .scatter(2, index, copied, IndexingUpdateOp::Add)
            .clamp_min(MIN_PROB)
            .log()
    }

    /// Log-probabilities of the symbol following each prefix.
    /// prefix: [k, t] → [k, E]
    pub fn next_token_log_probs(&self, enc: &EncodedGraph<B>, prefix: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let [_, steps] = prefix.dims();
        self.decode(enc, prefix).narrow(1, steps - 1, 1).squeeze_dim(1)
    }

    /// Token-level negative log-likelihood under teacher forcing,
    /// averaged over real (unpadded) target positions.
    pub fn forward_loss(&self, batch: Graph2TreeBatch<B>) -> Tensor<B, 1> {
        let enc = self.encode_batch(&batch);
        let log_probs = self.decode(&enc, batch.decoder_input);

        let picked: Tensor<B, 2> = log_probs
            .gather(2, batch.targets.unsqueeze_dim::<3>(2))
            .squeeze_dim(2);
        let mask = batch.target_mask;
        let tokens = mask.clone().sum();
        (picked * mask).sum().neg() / tokens
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::Graph2TreeBatcher;
    use crate::data::dataset::MwpSample;
    use crate::domain::graph::GraphNode;
    use crate::domain::vocab::Vocab;
    use crate::ml::graph_encoder::GraphEmbeddingKind;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;
    use std::sync::Arc;

    type TestBackend = NdArray;

    fn vocab() -> Vocab {
        let mut v = Vocab::new();
        for s in ["x", "=", "3", "+", "5", "apples"] {
            v.add_symbol(s);
        }
        v
    }

    fn sample(v: &Vocab, tokens: &[&str], targets: &[&str]) -> MwpSample {
        let nodes: Vec<GraphNode> = tokens.iter().map(|t| GraphNode::new(*t)).collect();
        MwpSample {
            node_ids: nodes.iter().map(|n| v.get_symbol_idx(&n.token)).collect(),
            edges: (1..nodes.len()).map(|i| (0, i, 0)).collect(),
            nodes,
            target_tokens: targets.iter().map(|t| t.to_string()).collect(),
            target_ids: v.get_symbol_idx_for_list(targets),
        }
    }

    fn config(v: &Vocab, kind: GraphEmbeddingKind, use_copy: bool) -> Graph2TreeConfig {
        Graph2TreeConfig::new(
            v.len(),
            v.len(),
            GraphEncoderConfig::new(kind, 8, 8, 1, 2),
            2,
            1,
            16,
            16,
        )
        .with_use_copy(use_copy)
        .with_dropout(0.0)
    }

    fn batch(v: &Vocab, kind: GraphEmbeddingKind, use_copy: bool) -> Graph2TreeBatch<TestBackend> {
        let items = vec![
            sample(v, &["tom", "apples", "3"], &["x", "=", "3", "+", "tom"]),
            sample(v, &["5", "3"], &["x", "=", "5"]),
        ];
        Graph2TreeBatcher::new(Arc::new(v.clone()), v.len(), 2, kind, use_copy)
            .batch(items, &Default::default())
    }

    #[test]
    fn test_decode_shapes_without_copy() {
        let v = vocab();
        let model = config(&v, GraphEmbeddingKind::Rgcn, false).init::<TestBackend>(&Default::default());
        let b = batch(&v, GraphEmbeddingKind::Rgcn, false);
        let enc = model.encode_batch(&b);
        assert_eq!(enc.memory.dims(), [2, 3, 8]);
        let lp = model.decode(&enc, b.decoder_input.clone());
        assert_eq!(lp.dims(), [2, 6, v.len()]);
    }

    #[test]
    fn test_copy_distribution_covers_extended_vocab() {
        let v = vocab();
        let model = config(&v, GraphEmbeddingKind::Gcn, true).init::<TestBackend>(&Default::default());
        let b = batch(&v, GraphEmbeddingKind::Gcn, true);
        assert_eq!(b.ext_vocab_size, v.len() + 1);

        let enc = model.encode_batch(&b);
        let lp = model.decode(&enc, b.decoder_input.clone());
        assert_eq!(lp.dims(), [2, 6, v.len() + 1]);

        // each step is a proper distribution
        let sums: Vec<f32> = lp.exp().sum_dim(2).into_data().iter::<f32>().collect();
        assert!(sums.iter().all(|s| (s - 1.0).abs() < 1e-3), "{sums:?}");
    }

    #[test]
    fn test_loss_is_finite_and_positive() {
        let v = vocab();
        let model = config(&v, GraphEmbeddingKind::Gcn, true).init::<TestBackend>(&Default::default());
        let loss: f32 = model.forward_loss(batch(&v, GraphEmbeddingKind::Gcn, true)).into_scalar();
        assert!(loss.is_finite() && loss > 0.0);
    }

    #[test]
    fn test_next_token_for_beam_tiles() {
        let v = vocab();
        let model = config(&v, GraphEmbeddingKind::Rgcn, false).init::<TestBackend>(&Default::default());
        let b = batch(&v, GraphEmbeddingKind::Rgcn, false);
        let single = model.encode(
            b.node_ids.clone().narrow(0, 0, 1),
            b.adjacency.clone().narrow(0, 0, 1),
            b.node_pad_mask.clone().narrow(0, 0, 1),
            None,
            v.len(),
        );
        let tiled = single.repeat(3);
        assert_eq!(tiled.memory.dims(), [3, 3, 8]);
        let prefix = Tensor::<TestBackend, 2, Int>::from_ints([[1, 4], [1, 5], [1, 6]], &Default::default());
        assert_eq!(model.next_token_log_probs(&tiled, prefix).dims(), [3, v.len()]);
    }
}
