// ============================================================
// Layer 5 — Tree Decoding
// ============================================================
// Turns one encoded graph into a symbol sequence.
//
//   beam_size == 1  → greedy: take the arg-max symbol each step
//   beam_size  > 1  → beam search over summed log-probabilities
//
// Decoding stops at </s> or after `max_decode_len` symbols.
// Symbols are ids in the batch's index space (the extended
// vocabulary when copying); an id the decoder cannot embed is
// fed back as <UNK>.

use burn::prelude::*;
use std::cmp::Ordering;

use crate::domain::vocab::{EOS_IDX, SOS_IDX, UNK_IDX};
use crate::ml::graph2tree::{EncodedGraph, Graph2Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    pub beam_size:      usize,
    pub max_decode_len: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Hypothesis {
    tokens: Vec<usize>,
    score:  f64,
}

/// Decode a single graph (`enc` must have batch size 1).
/// The returned ids exclude <s> and </s>.
pub fn translate<B: Backend>(model: &Graph2Tree<B>, enc: &EncodedGraph<B>, opts: DecodeOptions) -> Vec<usize> {
    if opts.beam_size <= 1 {
        greedy_decode(model, enc, opts.max_decode_len)
    } else {
        beam_search(model, enc, opts)
    }
}

fn prefix_tensor<B: Backend>(
    hyps:       &[&Hypothesis],
    vocab_size: usize,
    device:     &B::Device,
) -> Tensor<B, 2, Int> {
    let steps = hyps.first().map_or(0, |h| h.tokens.len()) + 1;
    let flat: Vec<i32> = hyps
        .iter()
        .flat_map(|h| {
            std::iter::once(SOS_IDX)
                .chain(h.tokens.iter().map(|&t| if t >= vocab_size { UNK_IDX } else { t }))
                .map(|t| t as i32)
        })
        .collect();
    Tensor::<B, 2, Int>::from_ints(TensorData::new(flat, [hyps.len(), steps]), device)
}

fn step_scores<B: Backend>(
    model: &Graph2Tree<B>,
    enc:   &EncodedGraph<B>,
    hyps:  &[&Hypothesis],
) -> Vec<Vec<f32>> {
    let device = enc.memory.device();
    let prefix = prefix_tensor::<B>(hyps, model.out_vocab_size, &device);
    let tiled = if hyps.len() == 1 { enc.clone() } else { enc.repeat(hyps.len()) };

    let log_probs = model.next_token_log_probs(&tiled, prefix);
    let [_, width] = log_probs.dims();
    let flat: Vec<f32> = log_probs.into_data().iter::<f32>().collect();
    flat.chunks(width.max(1)).map(<[f32]>::to_vec).collect()
}

pub fn greedy_decode<B: Backend>(model: &Graph2Tree<B>, enc: &EncodedGraph<B>, max_decode_len: usize) -> Vec<usize> {
    let mut hyp = Hypothesis { tokens: Vec::new(), score: 0.0 };
    for _ in 0..max_decode_len {
        let scores = step_scores(model, enc, &[&hyp]);
        let Some((best, lp)) = scores[0]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(&a.0)))
        else {
            break;
        };
        if best == EOS_IDX {
            break;
        }
        hyp.score += *lp as f64;
        hyp.tokens.push(best);
    }
    hyp.tokens
}

pub fn beam_search<B: Backend>(model: &Graph2Tree<B>, enc: &EncodedGraph<B>, opts: DecodeOptions) -> Vec<usize> {
    let width = opts.beam_size.max(1);
    let mut live = vec![Hypothesis { tokens: Vec::new(), score: 0.0 }];
    let mut finished: Vec<Hypothesis> = Vec::new();

    for _ in 0..opts.max_decode_len {
        if live.is_empty() || finished.len() >= width {
            break;
        }
        let refs: Vec<&Hypothesis> = live.iter().collect();
        let scores = step_scores(model, enc, &refs);

        // (score, beam, symbol), best first; ties keep the lower beam / symbol
        let mut candidates: Vec<(f64, usize, usize)> = scores
            .iter()
            .enumerate()
            .flat_map(|(beam, row)| {
                let base = live[beam].score;
                row.iter().enumerate().map(move |(sym, &lp)| (base + lp as f64, beam, sym))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        candidates.truncate(width);

        let mut next = Vec::with_capacity(width);
        for (score, beam, sym) in candidates {
            if sym == EOS_IDX {
                finished.push(Hypothesis { tokens: live[beam].tokens.clone(), score });
            } else {
                let mut tokens = live[beam].tokens.clone();
                tokens.push(sym);
                next.push(Hypothesis { tokens, score });
            }
        }
        live = next;
    }

    if finished.is_empty() {
        finished = live;
    }
    finished
        .into_iter()
        .reduce(|best, h| if h.score > best.score { h } else { best })
        .map(|h| h.tokens)
        .unwrap_or_default()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::graph2tree::Graph2TreeConfig;
    use crate::ml::graph_encoder::{GraphEmbeddingKind, GraphEncoderConfig};
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn setup() -> (Graph2Tree<TestBackend>, EncodedGraph<TestBackend>) {
        let device = Default::default();
        let model = Graph2TreeConfig::new(
            12,
            12,
            GraphEncoderConfig::new(GraphEmbeddingKind::Gcn, 8, 8, 1, 1),
            2,
            1,
            16,
            32,
        )
        .with_dropout(0.0)
        .init::<TestBackend>(&device);

        let enc = model.encode(
            Tensor::<TestBackend, 2, Int>::from_ints([[4, 5, 6]], &device),
            Tensor::<TestBackend, 4>::ones([1, 1, 3, 3], &device).div_scalar(3.0),
            Tensor::<TestBackend, 2, Int>::from_ints([[0, 0, 0]], &device).equal_elem(1),
            None,
            12,
        );
        (model, enc)
    }

    #[test]
    fn test_greedy_respects_max_len() {
        let (model, enc) = setup();
        let out = translate(&model, &enc, DecodeOptions { beam_size: 1, max_decode_len: 5 });
        assert!(out.len() <= 5);
        assert!(out.iter().all(|&t| t < 12 && t != EOS_IDX));
    }

    #[test]
    fn test_beam_output_is_bounded() {
        let (model, enc) = setup();
        let out = translate(&model, &enc, DecodeOptions { beam_size: 3, max_decode_len: 6 });
        assert!(out.len() <= 6);
        assert!(!out.contains(&EOS_IDX));
    }

    #[test]
    fn test_zero_length_decodes_nothing() {
        let (model, enc) = setup();
        assert!(translate(&model, &enc, DecodeOptions { beam_size: 2, max_decode_len: 0 }).is_empty());
    }

    #[test]
    fn test_prefix_maps_extended_ids_to_unk() {
        let h = Hypothesis { tokens: vec![4, 20], score: 0.0 };
        let t = prefix_tensor::<TestBackend>(&[&h], 12, &Default::default());
        let ids: Vec<i64> = t.into_data().iter::<i64>().collect();
        assert_eq!(ids, vec![SOS_IDX as i64, 4, UNK_IDX as i64]);
    }
}
