// ============================================================
// Layer 5 — KG Completion Training Loop
// ============================================================
// 1-N scoring: each (e1, rel) batch row is scored against every
// entity and trained with binary cross-entropy on smoothed
// multi-hot targets. On evaluation epochs the dev and test
// splits are ranked with the filtered protocol; the model with
// the best dev MRR is kept and saved at the end.

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::config::KgcConfig;
use crate::data::{dataset::KgDataset, kg_batcher::KgBatcher, kg_graph::MessageEdges};
use crate::domain::best_model::{BestModelTracker, BestScore};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    runtime::Runtime,
};
use crate::ml::{
    backend::TrainBackend,
    kgc_evaluator::ranking_and_hits,
    kgc_model::{KgGraphTensors, KgcModel, KgcModelConfig},
};

pub struct KgcTrainInputs {
    pub model: KgcModelConfig,
    /// Message-passing edges, for GCN-encoded models only.
    pub edges: Option<MessageEdges>,
    pub train: KgDataset,
    pub dev:   KgDataset,
    pub test:  KgDataset,
}

pub fn run_training(
    cfg:     &KgcConfig,
    inputs:  KgcTrainInputs,
    runtime: &Runtime,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
) -> Result<BestScore> {
    tracing::info!("Training {} on {:?}", cfg.model_name(), runtime.device);
    train_loop::<TrainBackend>(cfg, inputs, runtime.device.clone(), runtime.num_workers, ckpt, metrics)
}

fn train_loop<B: AutodiffBackend>(
    cfg:         &KgcConfig,
    inputs:      KgcTrainInputs,
    device:      B::Device,
    num_workers: usize,
    ckpt:        &CheckpointManager,
    metrics:     &MetricsLogger,
) -> Result<BestScore> {
    let args = &cfg.training_args;
    let schedule = args.schedule();

    let mut model: KgcModel<B> = inputs.model.init(&device);
    let graph = inputs.edges.as_ref().and_then(|e| KgGraphTensors::<B>::from_edges(e, &device));
    let eval_graph = inputs
        .edges
        .as_ref()
        .and_then(|e| KgGraphTensors::<B::InnerBackend>::from_edges(e, &device));
    tracing::info!(
        "Model ready: {} entities, {} relations, dim={}, gcn layers={}",
        inputs.model.num_entities,
        inputs.model.num_relations,
        inputs.model.embedding_dim,
        if graph.is_some() { inputs.model.gcn_layers } else { 0 },
    );

    let mut optim = AdamConfig::new()
        .with_weight_decay((args.weight_decay > 0.0).then(|| WeightDecayConfig::new(args.weight_decay)))
        .with_grad_clipping(Some(GradientClippingConfig::Value(args.grad_clip)))
        .init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let batcher = KgBatcher::new(inputs.model.num_entities, args.label_smoothing);
    let train_loader = DataLoaderBuilder::<B, _, _>::new(batcher.clone())
        .batch_size(args.batch_size)
        .shuffle(cfg.env_args.seed)
        .num_workers(num_workers)
        .set_device(device.clone())
        .build(inputs.train);

    let eval_loader = |dataset: KgDataset| {
        DataLoaderBuilder::<B::InnerBackend, _, _>::new(batcher.clone())
            .batch_size(args.batch_size)
            .num_workers(num_workers)
            .set_device(device.clone())
            .build(dataset)
    };
    let dev_loader = eval_loader(inputs.dev);
    let test_loader = eval_loader(inputs.test);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut tracker = BestModelTracker::new();

    for epoch in 1..=args.max_epochs {
        let mut loss_sum = 0.0f64;
        let mut batches = 0usize;

        for batch in train_loader.iter() {
            let loss = model.forward_loss(batch.e1, batch.rel, batch.targets, graph.as_ref());
            loss_sum += loss.clone().into_scalar().elem::<f64>();
            batches += 1;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(args.learning_rate, model, grads);
        }

        let train_loss = if batches > 0 { loss_sum / batches as f64 } else { f64::NAN };
        let mut row = EpochMetrics::new(epoch, train_loss);

        if schedule.should_evaluate(epoch) {
            let snapshot = model.valid();
            let dev = ranking_and_hits(&snapshot, dev_loader.as_ref(), eval_graph.as_ref(), "dev");
            let test = ranking_and_hits(&snapshot, test_loader.as_ref(), eval_graph.as_ref(), "test");

            let (dev_mrr, test_mrr) = (dev.combined.mrr, test.combined.mrr);
            let improved = tracker.observe(BestScore { epoch, val: dev_mrr, test: Some(test_mrr) }, &snapshot);
            println!(
                "Epoch {:>3}/{} | train_loss={:.4} | dev_mrr={:.4} | test_mrr={:.4} | dev_hits@10={:.4}{}",
                epoch, args.max_epochs, train_loss, dev_mrr, test_mrr, dev.combined.hits_at(10),
                if improved { " | best" } else { "" },
            );
            row = row.with_scores(Some(dev_mrr), Some(test_mrr));
        } else {
            println!("Epoch {:>3}/{} | train_loss={:.4}", epoch, args.max_epochs, train_loss);
        }
        metrics.log(&row)?;
    }

    let (best, _) = ckpt.save_best(tracker, schedule, args.max_epochs)?;
    tracing::info!("Best dev MRR {:.4} at epoch {}", best.val, best.epoch);
    Ok(best)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{dataset::KgSample, kg_graph::{Direction, KgGraph}};
    use crate::domain::best_model::EvalSchedule;
    use crate::ml::kgc_model::KgcDecoder;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn sample(e1: usize, rel: usize, e2: usize) -> KgSample {
        KgSample {
            e1,
            rel,
            e2:        Some(e2),
            rel_eval:  Some(rel + 1),
            e2_multi1: vec![e2],
            e2_multi2: vec![e1],
        }
    }

    #[test]
    fn test_gcn_run_keeps_best_dev_model() {
        let tmp = tempfile::tempdir().unwrap();
        let train = vec![sample(4, 4, 5), sample(5, 4, 6), sample(6, 6, 7)];
        let graph = KgGraph::from_samples(&train, 10, 8);

        let mut cfg = KgcConfig::default();
        cfg.training_args.max_epochs = 3;
        cfg.training_args.eval_every = 2;
        cfg.training_args.batch_size = 2;

        let model_cfg = KgcModelConfig::new(10, 8, 4, KgcDecoder::DistMult).with_gcn_layers(1);
        let inputs = KgcTrainInputs {
            model: model_cfg.clone(),
            edges: Some(graph.message_edges(Direction::Undirected)),
            train: KgDataset::new(train.clone()),
            dev:   KgDataset::new(train[..2].to_vec()),
            test:  KgDataset::new(train[2..].to_vec()),
        };

        let ckpt = CheckpointManager::new(tmp.path(), "kinship_gcn_distmult").unwrap();
        let metrics = MetricsLogger::new(tmp.path(), "kinship_gcn_distmult").unwrap();
        let best = train_loop::<TestBackend>(&cfg, inputs, Default::default(), 0, &ckpt, &metrics).unwrap();

        // only epoch 2 evaluates with warmup 0 and cadence 2 over 3 epochs
        assert_eq!(best.epoch, 2);
        assert!(best.val > 0.0 && best.val <= 1.0);
        assert!(tmp.path().join("kinship_gcn_distmult.mpk").exists());

        // the saved record fits the trained architecture
        let device = Default::default();
        assert!(ckpt.load_model(model_cfg.init::<NdArray>(&device), &device).is_ok());
    }

    fn entity_weights(model: &KgcModel<NdArray>) -> Vec<f32> {
        model.entity_emb.weight.val().into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_saved_weights_are_the_peak_epoch_not_the_last() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        let model_cfg = KgcModelConfig::new(10, 8, 4, KgcDecoder::DistMult);

        // dev MRR peaks at epoch 2, then drops while training continues
        let peak: KgcModel<NdArray> = model_cfg.init(&device);
        let last: KgcModel<NdArray> = model_cfg.init(&device);
        let mut tracker = BestModelTracker::new();
        tracker.observe(BestScore { epoch: 2, val: 0.6, test: Some(0.5) }, &peak);
        tracker.observe(BestScore { epoch: 4, val: 0.3, test: Some(0.2) }, &last);

        let ckpt = CheckpointManager::new(tmp.path(), "kinship_distmult").unwrap();
        let (best, _) = ckpt.save_best(tracker, EvalSchedule::new(0, 2), 4).unwrap();
        assert_eq!(best.epoch, 2);

        let restored = ckpt.load_model(model_cfg.init::<NdArray>(&device), &device).unwrap();
        let close = |a: &[f32], b: &[f32]| a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-2);
        assert!(close(&entity_weights(&restored), &entity_weights(&peak)));
        assert!(!close(&entity_weights(&restored), &entity_weights(&last)));
    }
}
