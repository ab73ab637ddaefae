// ============================================================
// Layer 2 — Graph-to-Tree Training Use Case
// ============================================================
// Orchestrates a math-word-problem training run:
//
//   Step 1: Validate and log the config       (Layer 2 / 6)
//   Step 2: Runtime setup                     (Layer 6 - infra)
//   Step 3: Load train / valid / test graphs  (Layer 4 - data)
//   Step 4: Build vocabularies                (Layer 4 - data)
//   Step 5: Build datasets and batcher        (Layer 4 - data)
//   Step 6: Size the model                    (Layer 5 - ml)
//   Step 7: Save config and vocab side files  (Layer 6 - infra)
//   Step 8: Train, keep and save the best     (Layer 5 - ml)

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::application::config::MawpsConfig;
use crate::data::{
    batcher::Graph2TreeBatcher,
    dataset::MwpDataset,
    loader::MawpsLoader,
    preprocessor::Preprocessor,
    splitter::split_train_val,
    vocab_builder::MwpVocabBuilder,
};
use crate::domain::{
    best_model::BestScore,
    traits::{ExampleSource, Split},
    vocab::VocabModel,
};
use crate::infra::{
    checkpoint::{CheckpointManager, CONFIG_FILE, VOCAB_FILE},
    config_loader::print_config,
    metrics::MetricsLogger,
    runtime,
};
use crate::ml::{
    graph2tree::Graph2TreeConfig,
    graph_encoder::GraphEncoderConfig,
    mawps_trainer::{run_training, MwpTrainInputs},
};

pub struct MawpsTrainUseCase {
    config: MawpsConfig,
}

impl MawpsTrainUseCase {
    pub fn new(config: MawpsConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<BestScore> {
        let cfg = &self.config;

        // ── Step 1: Config ────────────────────────────────────────────────────
        cfg.validate()?;
        print_config(cfg)?;
        let kind = cfg.graph_embedding_kind()?;

        // ── Step 2: Runtime ───────────────────────────────────────────────────
        let runtime = runtime::init(&cfg.env_args);

        // ── Step 3: Load graphs ───────────────────────────────────────────────
        let share = cfg.graph_share();
        let loader = MawpsLoader::new(&share.root_dir, &share.topology_subdir);
        let train = loader.load_split(Split::Train)?;
        let test = loader.load_split(Split::Test)?;
        let (train, valid) = if loader.has_split(Split::Valid) {
            (train, loader.load_split(Split::Valid)?)
        } else {
            let ratio = cfg.preprocessing_args.val_split_ratio;
            tracing::info!("No validation file; holding out {:.0}% of train", ratio * 100.0);
            split_train_val(train, ratio, cfg.env_args.seed)
        };
        if train.is_empty() {
            bail!("no usable training examples under '{}'", share.root_dir);
        }
        tracing::info!("Split: {} train, {} valid, {} test", train.len(), valid.len(), test.len());

        // ── Step 4: Vocabularies ──────────────────────────────────────────────
        let pre = Preprocessor::new(cfg.preprocessing_args.lower_case);
        let vocab = MwpVocabBuilder::new(cfg.preprocessing_args.min_freq, share.share_vocab, pre)
            .build(&train, &[train.as_slice(), valid.as_slice(), test.as_slice()])?;

        // ── Step 5: Datasets and batcher ─────────────────────────────────────
        let train = MwpDataset::from_examples(&train, &vocab, &pre)?;
        let valid = MwpDataset::from_examples(&valid, &vocab, &pre)?;
        let test = MwpDataset::from_examples(&test, &vocab, &pre)?;

        let num_relations = relation_count(cfg, &vocab)?;
        let batcher = Graph2TreeBatcher::new(
            Arc::new(vocab.in_word_vocab.clone()),
            vocab.out_word_vocab.len(),
            num_relations,
            kind,
            cfg.use_copy(),
        );

        // ── Step 6: Model size ────────────────────────────────────────────────
        let longest_target = [&train, &valid, &test]
            .iter()
            .flat_map(|d| d.samples())
            .map(|s| s.target_ids.len())
            .max()
            .unwrap_or(0);
        let max_positions = (longest_target + 1).max(cfg.inference_args.max_decode_len + 1);
        let model = model_config(cfg, &vocab, num_relations, max_positions)?;

        // ── Step 7: Side files ────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_args.out_dir, &cfg.checkpoint_args.checkpoint_name)?;
        ckpt.save_json(CONFIG_FILE, cfg)?;
        ckpt.save_json(VOCAB_FILE, &vocab)?;
        let metrics = MetricsLogger::new(ckpt.dir(), ckpt.stem())?;

        // ── Step 8: Train ─────────────────────────────────────────────────────
        let inputs = MwpTrainInputs {
            model,
            batcher,
            out_vocab: vocab.out_word_vocab.clone(),
            train,
            valid,
            test,
        };
        run_training(cfg, inputs, runtime, &ckpt, &metrics)
    }
}

/// Adjacency channels for RGCN: the edge-label count, or
/// `num_rels` when the config pins it.
fn relation_count(cfg: &MawpsConfig, vocab: &VocabModel) -> Result<usize> {
    let labels = vocab.edge_vocab.len();
    match cfg.model_args.graph_embedding_args.num_rels {
        Some(n) if n < labels => bail!("graph_embedding_args.num_rels = {n} but the data has {labels} edge labels"),
        Some(n) => Ok(n),
        None => Ok(labels.max(1)),
    }
}

fn model_config(
    cfg:           &MawpsConfig,
    vocab:         &VocabModel,
    num_relations: usize,
    max_positions: usize,
) -> Result<Graph2TreeConfig> {
    let model_args = &cfg.model_args;
    let embedding = &model_args.graph_embedding_args;
    let decoder = &model_args.decoder_args;

    let encoder = GraphEncoderConfig::new(
        cfg.graph_embedding_kind()?,
        model_args.graph_initialization_args.input_size,
        embedding.hidden_size,
        embedding.num_layers,
        num_relations,
    )
    .with_feat_drop(embedding.feat_drop);

    Ok(Graph2TreeConfig::new(
        vocab.in_word_vocab.len(),
        vocab.out_word_vocab.len(),
        encoder,
        decoder.num_heads,
        decoder.num_layers,
        decoder.ff_size,
        max_positions,
    )
    .with_dropout(decoder.rnn_decoder_share.dropout)
    .with_use_copy(cfg.use_copy())
    .with_init_weight(cfg.training_args.init_weight))
}
