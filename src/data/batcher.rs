// ============================================================
// Layer 4 — Graph-to-Tree Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<MwpSample> into
// padded tensors for the graph encoder and the tree decoder.
//
// How batching works here:
//   Input:  N samples with up to Nn nodes and up to T-1 target
//           symbols each
//   Output: Graph2TreeBatch with
//             node_ids       [N, Nn]          input-vocab ids
//             node_pad_mask  [N, Nn]          true = padding node
//             adjacency      [N, R, Nn, Nn]   normalised, see below
//             token_id_oov   [N, Nn]          extended-vocab ids (copy)
//             decoder_input  [N, T]           <s> y1 .. y(T-1)
//             targets        [N, T]           y1 .. y(T-1) </s>
//             target_mask    [N, T]           1.0 on real positions
//
// With copy enabled every batch gets its own extended vocabulary
// (see ext_vocab.rs). Targets are indexed against it; the decoder
// input cannot embed extended ids, so those become <UNK>.
//
// Adjacency:
//   GCN  — one relation, edges made undirected, self loops added,
//          symmetric normalisation D^-1/2 (A + I) D^-1/2
//   RGCN — one matrix per edge label, row r[dst][src] = 1/in-degree
//          of dst under that label; self loops are a separate weight

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};
use std::sync::Arc;

use crate::data::dataset::MwpSample;
use crate::data::ext_vocab::prepare_ext_vocab;
use crate::domain::vocab::{Vocab, EOS_IDX, PAD_IDX, SOS_IDX, UNK_IDX};
use crate::ml::graph_encoder::GraphEmbeddingKind;

// ─── Graph2TreeBatch ─────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct Graph2TreeBatch<B: Backend> {
    pub node_ids:      Tensor<B, 2, Int>,
    pub node_pad_mask: Tensor<B, 2, Bool>,
    pub adjacency:     Tensor<B, 4>,
    pub token_id_oov:  Option<Tensor<B, 2, Int>>,
    pub decoder_input: Tensor<B, 2, Int>,
    pub targets:       Tensor<B, 2, Int>,
    pub target_mask:   Tensor<B, 2>,

    /// The batch's extended vocabulary (copy only).
    pub oov_vocab:      Option<Vocab>,
    /// Size of the distribution the decoder predicts over.
    pub ext_vocab_size: usize,
    /// Target ids without </s>, in the batch's index space.
    pub references:     Vec<Vec<usize>>,
}

impl<B: Backend> Graph2TreeBatch<B> {
    /// The vocabulary that resolves `references` and decoded ids.
    pub fn vocab<'a>(&'a self, out_vocab: &'a Vocab) -> &'a Vocab {
        self.oov_vocab.as_ref().unwrap_or(out_vocab)
    }
}

// ─── Graph2TreeBatcher ───────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct Graph2TreeBatcher {
    in_vocab:       Arc<Vocab>,
    out_vocab_size: usize,
    num_relations:  usize,
    kind:           GraphEmbeddingKind,
    use_copy:       bool,
}

impl Graph2TreeBatcher {
    pub fn new(
        in_vocab:       Arc<Vocab>,
        out_vocab_size: usize,
        num_relations:  usize,
        kind:           GraphEmbeddingKind,
        use_copy:       bool,
    ) -> Self {
        Self { in_vocab, out_vocab_size, num_relations, kind, use_copy }
    }

    /// Relation channels in the adjacency tensor.
    pub fn relation_channels(&self) -> usize {
        match self.kind {
            GraphEmbeddingKind::Gcn => 1,
            GraphEmbeddingKind::Rgcn => self.num_relations.max(1),
        }
    }
}

impl<B: Backend> Batcher<B, MwpSample, Graph2TreeBatch<B>> for Graph2TreeBatcher {
    fn batch(&self, items: Vec<MwpSample>, device: &B::Device) -> Graph2TreeBatch<B> {
        let batch_size = items.len();
        let max_nodes  = items.iter().map(MwpSample::node_count).max().unwrap_or(0).max(1);
        let channels   = self.relation_channels();

        // ── Extended vocabulary and targets ───────────────────────────────────
        let ext = self
            .use_copy
            .then(|| prepare_ext_vocab(&self.in_vocab, items.iter().map(|s| s.nodes.as_slice())));

        let references: Vec<Vec<usize>> = match &ext {
            Some(ext) => items.iter().map(|s| ext.index_tokens(&s.target_tokens)).collect(),
            None => items.iter().map(|s| s.target_ids.clone()).collect(),
        };
        let ext_vocab_size = ext.as_ref().map_or(self.out_vocab_size, |e| e.vocab.len());
        let steps = references.iter().map(Vec::len).max().unwrap_or(0) + 1;

        // ── Flatten node data ────────────────────────────────────────────────
        let mut node_flat = vec![PAD_IDX as i32; batch_size * max_nodes];
        let mut pad_flat  = vec![1i32; batch_size * max_nodes];
        let mut oov_flat  = vec![PAD_IDX as i32; batch_size * max_nodes];
        let mut adjacency = Vec::with_capacity(batch_size * channels * max_nodes * max_nodes);

        for (b, sample) in items.iter().enumerate() {
            for (i, &id) in sample.node_ids.iter().enumerate() {
                node_flat[b * max_nodes + i] = id as i32;
                pad_flat[b * max_nodes + i]  = 0;
            }
            if let Some(ext) = &ext {
                for (i, &id) in ext.token_id_oov[b].iter().enumerate() {
                    oov_flat[b * max_nodes + i] = id as i32;
                }
            }
            adjacency.extend(build_adjacency(
                &sample.edges,
                sample.node_count(),
                max_nodes,
                channels,
                self.kind,
            ));
        }

        // ── Flatten decoder data ─────────────────────────────────────────────
        let mut input_flat  = vec![PAD_IDX as i32; batch_size * steps];
        let mut target_flat = vec![PAD_IDX as i32; batch_size * steps];
        let mut mask_flat   = vec![0.0f32; batch_size * steps];

        for (b, refs) in references.iter().enumerate() {
            let row = b * steps;
            input_flat[row] = SOS_IDX as i32;
            for (t, &id) in refs.iter().enumerate() {
                let fed = if id >= self.out_vocab_size { UNK_IDX } else { id };
                input_flat[row + t + 1] = fed as i32;
                target_flat[row + t]    = id as i32;
                mask_flat[row + t]      = 1.0;
            }
            target_flat[row + refs.len()] = EOS_IDX as i32;
            mask_flat[row + refs.len()]   = 1.0;
        }

        // ── Create tensors ───────────────────────────────────────────────────
        let ints = |flat: Vec<i32>, cols: usize| {
            Tensor::<B, 2, Int>::from_ints(TensorData::new(flat, [batch_size, cols]), device)
        };

        Graph2TreeBatch {
            node_ids:      ints(node_flat, max_nodes),
            node_pad_mask: ints(pad_flat, max_nodes).equal_elem(1),
            adjacency:     Tensor::<B, 4>::from_floats(
                TensorData::new(adjacency, [batch_size, channels, max_nodes, max_nodes]),
                device,
            ),
            token_id_oov:  ext.as_ref().map(|_| ints(oov_flat, max_nodes)),
            decoder_input: ints(input_flat, steps),
            targets:       ints(target_flat, steps),
            target_mask:   Tensor::<B, 2>::from_floats(TensorData::new(mask_flat, [batch_size, steps]), device),
            oov_vocab:     ext.map(|e| e.vocab),
            ext_vocab_size,
            references,
        }
    }
}

/// Row-major `[channels, padded, padded]` adjacency for one graph.
///
/// Nodes `n_nodes..padded` are padding and stay disconnected.
/// Edges whose relation id is out of range are ignored.
pub fn build_adjacency(
    edges:    &[(usize, usize, usize)],
    n_nodes:  usize,
    padded:   usize,
    channels: usize,
    kind:     GraphEmbeddingKind,
) -> Vec<f32> {
    let mut adj = vec![0.0f32; channels * padded * padded];
    let at = |r: usize, i: usize, j: usize| (r * padded + i) * padded + j;
    let in_range = |&&(s, d, _): &&(usize, usize, usize)| s < n_nodes && d < n_nodes;

    match kind {
        GraphEmbeddingKind::Gcn => {
            for i in 0..n_nodes {
                adj[at(0, i, i)] = 1.0;
            }
            for &(s, d, _) in edges.iter().filter(in_range) {
                adj[at(0, s, d)] = 1.0;
                adj[at(0, d, s)] = 1.0;
            }
            let degree: Vec<f32> = (0..n_nodes)
                .map(|i| (0..n_nodes).map(|j| adj[at(0, i, j)]).sum())
                .collect();
            for i in 0..n_nodes {
                for j in 0..n_nodes {
                    let a = &mut adj[at(0, i, j)];
                    if *a > 0.0 {
                        *a /= (degree[i] * degree[j]).sqrt();
                    }
                }
            }
        }
        GraphEmbeddingKind::Rgcn => {
            for &(s, d, r) in edges.iter().filter(in_range) {
                if r < channels {
                    adj[at(r, d, s)] = 1.0;
                }
            }
            for r in 0..channels {
                for d in 0..n_nodes {
                    let row = at(r, d, 0)..at(r, d, 0) + padded;
                    let in_degree: f32 = adj[row.clone()].iter().sum();
                    if in_degree > 0.0 {
                        adj[row].iter_mut().for_each(|a| *a /= in_degree);
                    }
                }
            }
        }
    }
    adj
}
