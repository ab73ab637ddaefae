// ============================================================
// Layer 4 — KG Completion Batcher
// ============================================================
// Stacks KgSamples into index tensors plus a smoothed multi-hot
// target over every entity:
//
//   y      = 1 for each known tail in e2_multi1, else 0
//   target = (1 - ε) · y + 1 / E
//
// Ranking needs the host-side ids and filter sets too, so the
// samples travel with the batch unchanged.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::KgSample;
use crate::domain::vocab::UNK_IDX;

#[derive(Debug, Clone)]
pub struct KgBatch<B: Backend> {
    pub e1:       Tensor<B, 1, Int>,
    pub rel:      Tensor<B, 1, Int>,
    /// Tail ids; <UNK> for training records without one.
    pub e2:       Tensor<B, 1, Int>,
    /// Reverse relation ids; <UNK> when absent.
    pub rel_eval: Tensor<B, 1, Int>,
    /// Smoothed multi-hot targets — shape: [batch_size, num_entities]
    pub targets:  Tensor<B, 2>,
    pub samples:  Vec<KgSample>,
}

#[derive(Clone, Debug)]
pub struct KgBatcher {
    num_entities:    usize,
    label_smoothing: f64,
}

impl KgBatcher {
    pub fn new(num_entities: usize, label_smoothing: f64) -> Self {
        Self { num_entities, label_smoothing }
    }
}

impl<B: Backend> Batcher<B, KgSample, KgBatch<B>> for KgBatcher {
    fn batch(&self, items: Vec<KgSample>, device: &B::Device) -> KgBatch<B> {
        let batch_size = items.len();
        let entities   = self.num_entities;
        let keep       = (1.0 - self.label_smoothing) as f32;
        let floor      = 1.0 / entities.max(1) as f32;

        let mut targets = vec![floor; batch_size * entities];
        for (b, s) in items.iter().enumerate() {
            for &e in s.e2_multi1.iter().filter(|&&e| e < entities) {
                targets[b * entities + e] = keep + floor;
            }
        }

        let ids = |f: fn(&KgSample) -> usize| {
            let flat: Vec<i32> = items.iter().map(|s| f(s) as i32).collect();
            Tensor::<B, 1, Int>::from_ints(TensorData::new(flat, [batch_size]), device)
        };

        KgBatch {
            e1:       ids(|s| s.e1),
            rel:      ids(|s| s.rel),
            e2:       ids(|s| s.e2.unwrap_or(UNK_IDX)),
            rel_eval: ids(|s| s.rel_eval.unwrap_or(UNK_IDX)),
            targets:  Tensor::<B, 2>::from_floats(TensorData::new(targets, [batch_size, entities]), device),
            samples:  items,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_targets_are_smoothed_multi_hot() {
        let items = vec![
            KgSample { e1: 4, rel: 4, e2: None, rel_eval: None, e2_multi1: vec![5, 6], e2_multi2: vec![] },
            KgSample { e1: 5, rel: 5, e2: Some(4), rel_eval: Some(6), e2_multi1: vec![4], e2_multi2: vec![5] },
        ];
        let batch: KgBatch<NdArray> = KgBatcher::new(8, 0.1).batch(items, &Default::default());

        assert_eq!(batch.targets.dims(), [2, 8]);
        let t: Vec<f32> = batch.targets.into_data().iter::<f32>().collect();
        assert!((t[5] - (0.9 + 0.125)).abs() < 1e-6);
        assert!((t[0] - 0.125).abs() < 1e-6);
        assert!((t[8 + 4] - (0.9 + 0.125)).abs() < 1e-6);

        let e2: Vec<i64> = batch.e2.into_data().iter::<i64>().collect();
        assert_eq!(e2, vec![UNK_IDX as i64, 4]);
        assert_eq!(batch.samples.len(), 2);
    }
}
