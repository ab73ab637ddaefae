// ============================================================
// Layer 5 — KG Ranking Evaluator
// ============================================================
// Scores every evaluation row in both directions and feeds the
// filtered ranks into a RankingAccumulator:
//
//   left  (tail):  P(· | e1, rel)       → rank of e2, filter e2_multi1
//   right (head):  P(· | e2, rel_eval)  → rank of e1, filter e2_multi2
//
// Rows without a tail or reverse relation cannot be ranked and
// are skipped with a warning.

use burn::{data::dataloader::DataLoader, prelude::*};

use crate::data::kg_batcher::KgBatch;
use crate::domain::ranking::{RankingAccumulator, RankingRecord, RankingReport};
use crate::ml::kgc_model::{KgGraphTensors, KgcModel};

/// Row-major host copy of a `[rows, cols]` score tensor.
pub fn score_rows<B: Backend>(scores: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, cols] = scores.dims();
    let flat: Vec<f32> = scores.into_data().iter::<f32>().collect();
    flat.chunks(cols.max(1)).map(<[f32]>::to_vec).collect()
}

pub fn ranking_and_hits<B: Backend>(
    model:  &KgcModel<B>,
    loader: &dyn DataLoader<B, KgBatch<B>>,
    graph:  Option<&KgGraphTensors<B>>,
    name:   &str,
) -> RankingReport {
    let mut acc = RankingAccumulator::new();
    let mut skipped = 0usize;

    for batch in loader.iter() {
        // Placeholder ids of unrankable rows never reach the model.
        let keep: Vec<i32> = batch
            .samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.e2.is_some() && s.rel_eval.is_some())
            .map(|(i, _)| i as i32)
            .collect();
        skipped += batch.samples.len() - keep.len();
        if keep.is_empty() {
            continue;
        }
        let index = Tensor::<B, 1, Int>::from_ints(TensorData::new(keep.clone(), [keep.len()]), &batch.e1.device());
        let pick = |ids: Tensor<B, 1, Int>| ids.select(0, index.clone());

        let tails = score_rows(model.predict(pick(batch.e1), pick(batch.rel), graph));
        let heads = score_rows(model.predict(pick(batch.e2), pick(batch.rel_eval), graph));

        for ((&i, mut tail_row), mut head_row) in keep.iter().zip(tails).zip(heads) {
            let sample = &batch.samples[i as usize];
            let Some(e2) = sample.e2 else { continue };
            acc.push(RankingRecord::from_predictions(
                &mut tail_row,
                &mut head_row,
                sample.e1,
                e2,
                &sample.e2_multi1,
                &sample.e2_multi2,
            ));
        }
    }

    if skipped > 0 {
        tracing::warn!("{name}: skipped {skipped} rows without e2 / rel_eval");
    }
    let report = acc.report();
    tracing::info!("{name}: ranked {} rows", acc.len());
    for line in report.lines() {
        tracing::info!("{name}: {line}");
    }
    report
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{dataset::{KgDataset, KgSample}, kg_batcher::KgBatcher};
    use crate::ml::kgc_model::{KgcDecoder, KgcModelConfig};
    use burn::{backend::NdArray, data::dataloader::DataLoaderBuilder};

    type TestBackend = NdArray;

    #[test]
    fn test_score_rows_splits_by_column_count() {
        let t = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], &Default::default());
        assert_eq!(score_rows(t), vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    fn model(num_relations: usize) -> KgcModel<TestBackend> {
        KgcModelConfig::new(8, num_relations, 4, KgcDecoder::DistMult)
            .with_input_drop(0.0)
            .with_hidden_drop(0.0)
            .init::<TestBackend>(&Default::default())
    }

    fn row(e1: usize, e2: Option<usize>) -> KgSample {
        KgSample {
            e1,
            rel: 1,
            e2,
            rel_eval: e2.map(|_| 2),
            e2_multi1: e2.into_iter().collect(),
            e2_multi2: vec![e1],
        }
    }

    fn loader(rows: Vec<KgSample>) -> std::sync::Arc<dyn DataLoader<TestBackend, KgBatch<TestBackend>>> {
        DataLoaderBuilder::<TestBackend, _, _>::new(KgBatcher::new(8, 0.0))
            .batch_size(2)
            .build(KgDataset::new(rows))
    }

    #[test]
    fn test_ranks_every_complete_row() {
        let model = model(4);
        let loader = loader(vec![row(4, Some(5)), row(6, Some(7)), row(5, None)]);

        let report = ranking_and_hits(&model, loader.as_ref(), None, "dev");
        assert_eq!(report.left.count, 2);
        assert_eq!(report.combined.count, 4);
        assert!(report.combined.mrr > 0.0 && report.combined.mrr <= 1.0);
        assert!(report.left.mean_rank >= 1.0 && report.left.mean_rank <= 8.0);
    }

    #[test]
    fn test_incomplete_rows_skip_the_forward_pass() {
        // Only 3 relations: the <UNK> placeholder (3) would be out of range.
        let model = model(3);
        let loader = loader(vec![row(5, None), row(4, Some(5)), row(6, None)]);

        let report = ranking_and_hits(&model, loader.as_ref(), None, "dev");
        assert_eq!(report.left.count, 1);
        assert_eq!(report.right.count, 1);
    }

    #[test]
    fn test_all_incomplete_rows_give_empty_report() {
        let loader = loader(vec![row(5, None), row(6, None)]);
        let report = ranking_and_hits(&model(3), loader.as_ref(), None, "test");
        assert_eq!(report.combined.count, 0);
    }
}
