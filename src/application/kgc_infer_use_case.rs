// ============================================================
// Layer 2 — KG Completion Inference Use Case
// ============================================================
// Read-only. Rebuilds the trained model from its checkpoint:
//
//   {out_dir}/{stem}_config.json  → architecture
//   {out_dir}/{stem}_vocab.json   → entity / relation names
//   {out_dir}/{stem}_graph.json   → background graph
//   {out_dir}/{stem}.mpk          → weights
//
// then answers the ad hoc queries under inference_args.queries
// and, when the dataset's test file exists, reports filtered
// ranking metrics over it.
//
// The stem comes from the config given on the command line, so
// it must name the same dataset and model as the training run.
// Architecture fields are taken from the saved config; only
// inference_args come from the command-line config.

use anyhow::Result;
use burn::data::dataloader::DataLoaderBuilder;

use crate::application::config::KgcConfig;
use crate::data::{
    dataset::KgDataset,
    kg_batcher::KgBatcher,
    kg_graph::KgGraph,
    kg_loader::KgLoader,
};
use crate::domain::{
    ranking::RankingReport,
    traits::{ExampleSource, Split},
    vocab::VocabModel,
};
use crate::infra::{
    checkpoint::{CheckpointManager, CONFIG_FILE, GRAPH_FILE, VOCAB_FILE},
    config_loader::print_config,
    runtime,
};
use crate::ml::{
    backend::InferBackend,
    kgc_evaluator::ranking_and_hits,
    kgc_inferencer::{KgcInferencer, TailPrediction},
};

pub struct KgcInferenceReport {
    pub predictions: Vec<TailPrediction>,
    /// Filtered ranking over the test split, when it exists.
    pub test:        Option<RankingReport>,
}

pub struct KgcInferUseCase {
    config: KgcConfig,
}

impl KgcInferUseCase {
    pub fn new(config: KgcConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<KgcInferenceReport> {
        let ckpt = CheckpointManager::new(&self.config.checkpoint_args.out_dir, self.config.checkpoint_stem())?;
        let saved = self.effective_config(ckpt.load_json(CONFIG_FILE)?);
        print_config(&saved)?;
        let vocab: VocabModel = ckpt.load_json(VOCAB_FILE)?;
        let graph: KgGraph = ckpt.load_json(GRAPH_FILE)?;

        let runtime = runtime::init(&saved.env_args);
        let device = runtime.device.clone();

        // ── Rebuild the model ────────────────────────────────────────────────
        let kind = saved.model_kind()?;
        let model_cfg = saved.model_config(vocab.in_word_vocab.len(), vocab.out_word_vocab.len())?;
        let model = ckpt.load_model(model_cfg.init::<InferBackend>(&device), &device)?;
        let edges = kind.gcn.then(|| graph.message_edges(kind.direction));
        let inferencer = KgcInferencer::new(model, vocab, edges.as_ref(), device.clone());

        // ── Ad hoc queries ───────────────────────────────────────────────────
        let args = &saved.inference_args;
        let mut queries = args.queries.clone();
        if saved.preprocessing_args.lower_case {
            queries.iter_mut().for_each(|q| q.lowercase());
        }
        let predictions = inferencer.predict(&queries, args.top_k);
        tracing::info!("Answered {} ad hoc queries", predictions.len());

        // ── Test split ranking ───────────────────────────────────────────────
        let loader = KgLoader::new(
            &saved.root_dir,
            &saved.preprocessing_args.dataset,
            saved.preprocessing_args.lower_case,
        );
        let test = if loader.has_split(Split::Test) {
            let records = loader.load_split(Split::Test)?;
            let dataset = KgDataset::from_records(&records, inferencer.vocab());
            let batcher = KgBatcher::new(model_cfg.num_entities, saved.training_args.label_smoothing);
            let test_loader = DataLoaderBuilder::<InferBackend, _, _>::new(batcher)
                .batch_size(saved.training_args.batch_size)
                .set_device(device)
                .build(dataset);
            Some(ranking_and_hits(inferencer.model(), test_loader.as_ref(), inferencer.graph(), "test"))
        } else {
            tracing::warn!("No test file at '{}'; skipping ranking", loader.split_path(Split::Test).display());
            None
        };

        Ok(KgcInferenceReport { predictions, test })
    }

    /// The saved training config with this run's inference_args.
    fn effective_config(&self, saved: KgcConfig) -> KgcConfig {
        KgcConfig { inference_args: self.config.inference_args.clone(), ..saved }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_config_keeps_saved_architecture() {
        let mut cli = KgcConfig::default();
        cli.inference_args.top_k = 3;
        cli.model_args.embedding_dim = 999;

        let mut saved = KgcConfig::default();
        saved.model_args.embedding_dim = 16;
        saved.inference_args.top_k = 50;

        let cfg = KgcInferUseCase::new(cli).effective_config(saved);
        assert_eq!(cfg.model_args.embedding_dim, 16);
        assert_eq!(cfg.inference_args.top_k, 3);
        assert!(print_config(&cfg).is_ok());
    }

    #[test]
    fn test_missing_checkpoint_fails_before_inference() {
        let tmp = tempfile::tempdir().unwrap();
        let mut cli = KgcConfig::default();
        cli.checkpoint_args.out_dir = tmp.path().display().to_string();
        assert!(KgcInferUseCase::new(cli).execute().is_err());
    }
}
