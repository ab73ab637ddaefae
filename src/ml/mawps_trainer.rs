// ============================================================
// Layer 5 — Graph-to-Tree Training Loop
// ============================================================
// Teacher-forced training with Adam, scheduled evaluation and
// best-model retention:
//
//   for epoch in 1..=max_epochs
//       for batch in train
//           loss = NLL(decode(encode(graph)), target)
//           grads = clip_by_value(∇loss, grad_clip)
//           θ = Adam(θ, grads, lr, weight_decay)
//       if epoch > warmup and epoch % eval_every == 0
//           evaluate on test, then on validation
//           keep a copy of the model if validation improved
//   save the kept copy
//
// Evaluation decodes one graph at a time on the inner backend,
// repairs parentheses against the batch vocabulary, and scores
// tree accuracy over a vocabulary grown across all batches so
// extended-vocabulary ids from different batches never collide.

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::application::config::MawpsConfig;
use crate::data::{
    batcher::{Graph2TreeBatch, Graph2TreeBatcher},
    dataset::MwpDataset,
};
use crate::domain::{
    best_model::{BestModelTracker, BestScore},
    tree::{repair_with_vocab, tree_accuracy},
    vocab::Vocab,
};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
    runtime::Runtime,
};
use crate::ml::{
    backend::TrainBackend,
    decoding::{translate, DecodeOptions},
    graph2tree::{Graph2Tree, Graph2TreeConfig},
};

/// Everything the loop needs besides the run configuration.
pub struct MwpTrainInputs {
    pub model:     Graph2TreeConfig,
    pub batcher:   Graph2TreeBatcher,
    pub out_vocab: Vocab,
    pub train:     MwpDataset,
    pub valid:     MwpDataset,
    pub test:      MwpDataset,
}

pub fn run_training(
    cfg:     &MawpsConfig,
    inputs:  MwpTrainInputs,
    runtime: &Runtime,
    ckpt:    &CheckpointManager,
    metrics: &MetricsLogger,
) -> Result<BestScore> {
    tracing::info!("Training graph-to-tree model on {:?}", runtime.device);
    train_loop::<TrainBackend>(cfg, inputs, runtime.device.clone(), runtime.num_workers, ckpt, metrics)
}

fn train_loop<B: AutodiffBackend>(
    cfg:         &MawpsConfig,
    inputs:      MwpTrainInputs,
    device:      B::Device,
    num_workers: usize,
    ckpt:        &CheckpointManager,
    metrics:     &MetricsLogger,
) -> Result<BestScore> {
    let args = &cfg.training_args;
    let schedule = args.schedule();
    let decode = DecodeOptions {
        beam_size:      cfg.inference_args.beam_size,
        max_decode_len: cfg.inference_args.max_decode_len,
    };

    // ── Build model ───────────────────────────────────────────────────────────
    let mut model: Graph2Tree<B> = inputs.model.init(&device);
    tracing::info!(
        "Model ready: {} decoder blocks, hidden={}, copy={}",
        inputs.model.num_layers,
        inputs.model.hidden_size(),
        inputs.model.use_copy,
    );

    // ── Adam with weight decay and clipping by value ─────────────────────────
    let mut optim = AdamConfig::new()
        .with_weight_decay((args.weight_decay > 0.0).then(|| WeightDecayConfig::new(args.weight_decay)))
        .with_grad_clipping(Some(GradientClippingConfig::Value(args.grad_clip)))
        .init();

    // ── Data loaders ──────────────────────────────────────────────────────────
    let train_loader = DataLoaderBuilder::<B, _, _>::new(inputs.batcher.clone())
        .batch_size(args.batch_size)
        .shuffle(cfg.env_args.seed)
        .num_workers(num_workers)
        .set_device(device.clone())
        .build(inputs.train);

    // One graph per batch; decoding runs without autodiff.
    let eval_loader = |dataset: MwpDataset| {
        DataLoaderBuilder::<B::InnerBackend, _, _>::new(inputs.batcher.clone())
            .batch_size(1)
            .num_workers(num_workers)
            .set_device(device.clone())
            .build(dataset)
    };
    let valid_loader = eval_loader(inputs.valid);
    let test_loader = eval_loader(inputs.test);

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut tracker = BestModelTracker::new();

    for epoch in 1..=args.max_epochs {
        let mut loss_sum = 0.0f64;
        let mut batches = 0usize;

        for batch in train_loader.iter() {
            let loss = model.forward_loss(batch);
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
            let test_acc = evaluate(&snapshot, test_loader.as_ref(), &inputs.out_vocab, decode);
            let val_acc = evaluate(&snapshot, valid_loader.as_ref(), &inputs.out_vocab, decode);

            let improved = tracker.observe(BestScore { epoch, val: val_acc, test: Some(test_acc) }, &snapshot);
            println!(
                "Epoch {:>3}/{} | train_loss={:.4} | val_acc={:.4} | test_acc={:.4}{}",
                epoch, args.max_epochs, train_loss, val_acc, test_acc,
                if improved { " | best" } else { "" },
            );
            row = row.with_scores(Some(val_acc), Some(test_acc));
        } else {
            println!("Epoch {:>3}/{} | train_loss={:.4}", epoch, args.max_epochs, train_loss);
        }
        metrics.log(&row)?;
    }

    let (best, _) = ckpt.save_best(tracker, schedule, args.max_epochs)?;
    tracing::info!(
        "Best validation accuracy {:.4} at epoch {} (test {:.4})",
        best.val, best.epoch, best.test.unwrap_or(f64::NAN),
    );
    Ok(best)
}

/// Tree accuracy of `model` over every graph the loader yields.
pub fn evaluate<B: Backend>(
    model:     &Graph2Tree<B>,
    loader:    &dyn DataLoader<B, Graph2TreeBatch<B>>,
    out_vocab: &Vocab,
    opts:      DecodeOptions,
) -> f64 {
    let mut eval_vocab = out_vocab.clone();
    let mut candidates = Vec::new();
    let mut references = Vec::new();

    for batch in loader.iter() {
        let enc = model.encode_batch(&batch);
        let vocab = batch.vocab(out_vocab);

        for (i, reference) in batch.references.iter().enumerate() {
            let decoded = repair_with_vocab(translate(model, &enc.item(i), opts), vocab);
            tracing::debug!(
                "pred: {} | gold: {}",
                vocab.symbols_for(&decoded).join(" "),
                vocab.symbols_for(reference).join(" "),
            );
            candidates.push(reindex(&decoded, vocab, &mut eval_vocab));
            references.push(reindex(reference, vocab, &mut eval_vocab));
        }
    }

    tree_accuracy(&candidates, &references, &eval_vocab)
}

/// Map ids from a batch vocabulary into the shared evaluation vocabulary.
fn reindex(ids: &[usize], from: &Vocab, into: &mut Vocab) -> Vec<usize> {
    from.symbols_for(ids).into_iter().map(|s| into.add_symbol(s)).collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::MwpSample;
    use crate::domain::graph::GraphNode;
    use crate::ml::graph_encoder::{GraphEmbeddingKind, GraphEncoderConfig};
    use burn::backend::{Autodiff, NdArray};
    use std::sync::Arc;

    type TestBackend = Autodiff<NdArray>;

    fn vocab() -> Vocab {
        let mut v = Vocab::new();
        for s in ["x", "=", "3", "+", "5", "(", ")", "apples"] {
            v.add_symbol(s);
        }
        v
    }

    fn sample(v: &Vocab, tokens: &[&str], target: &[&str]) -> MwpSample {
        MwpSample {
            nodes:         tokens.iter().map(|t| GraphNode::new(*t)).collect(),
            node_ids:      v.get_symbol_idx_for_list(tokens),
            edges:         vec![(0, 1, 0)],
            target_tokens: target.iter().map(|t| t.to_string()).collect(),
            target_ids:    v.get_symbol_idx_for_list(target),
        }
    }

    #[test]
    fn test_reindex_shares_symbols_across_vocabularies() {
        let base = vocab();
        let mut batch_a = base.clone();
        let oov_a = batch_a.add_symbol("pears");
        let mut batch_b = base.clone();
        let oov_b = batch_b.add_symbol("plums");
        assert_eq!(oov_a, oov_b);

        let mut global = base.clone();
        let a = reindex(&[oov_a], &batch_a, &mut global);
        let b = reindex(&[oov_b], &batch_b, &mut global);
        assert_ne!(a, b);
        assert_eq!(reindex(&[oov_a], &batch_a, &mut global), a);
    }

    #[test]
    fn test_short_run_saves_best_model() {
        let tmp = tempfile::tempdir().unwrap();
        let v = vocab();
        let samples = vec![
            sample(&v, &["apples", "3"], &["x", "=", "3", "+", "5"]),
            sample(&v, &["apples", "5"], &["x", "=", "5"]),
        ];

        let mut cfg = MawpsConfig::default();
        cfg.training_args.max_epochs = 2;
        cfg.training_args.eval_warmup_epochs = 0;
        cfg.training_args.eval_every = 1;
        cfg.training_args.batch_size = 2;
        cfg.inference_args.beam_size = 2;
        cfg.inference_args.max_decode_len = 6;

        let inputs = MwpTrainInputs {
            model: Graph2TreeConfig::new(
                v.len(),
                v.len(),
                GraphEncoderConfig::new(GraphEmbeddingKind::Rgcn, 8, 8, 1, 1),
                2,
                1,
                16,
                16,
            ),
            batcher: Graph2TreeBatcher::new(Arc::new(v.clone()), v.len(), 1, GraphEmbeddingKind::Rgcn, false),
            out_vocab: v.clone(),
            train: MwpDataset::new(samples.clone()),
            valid: MwpDataset::new(samples.clone()),
            test: MwpDataset::new(samples),
        };

        let ckpt = CheckpointManager::new(tmp.path(), "best_model").unwrap();
        let metrics = MetricsLogger::new(tmp.path(), "best_model").unwrap();
        let best = train_loop::<TestBackend>(&cfg, inputs, Default::default(), 0, &ckpt, &metrics).unwrap();

        assert!((1..=2).contains(&best.epoch));
        assert!((0.0..=1.0).contains(&best.val));
        assert!(tmp.path().join("best_model.mpk").exists());

        let csv = std::fs::read_to_string(metrics.csv_path()).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }
}
