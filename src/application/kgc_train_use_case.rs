// ============================================================
// Layer 2 — KG Completion Training Use Case
// ============================================================
//   Step 1: Validate and log the config             (Layer 2 / 6)
//   Step 2: Runtime setup                           (Layer 6 - infra)
//   Step 3: Load train / dev / test records         (Layer 4 - data)
//   Step 4: Entity / relation vocabularies          (Layer 4 - data)
//   Step 5: Datasets and background graph           (Layer 4 - data)
//   Step 6: Save config, vocab and graph            (Layer 6 - infra)
//   Step 7: Train, keep the best dev MRR, save it   (Layer 5 - ml)

use anyhow::Result;

use crate::application::config::KgcConfig;
use crate::data::{
    dataset::KgDataset,
    kg_graph::KgGraph,
    kg_loader::KgLoader,
    vocab_builder::build_kg_vocab,
};
use crate::domain::{
    best_model::BestScore,
    traits::{ExampleSource, Split},
};
use crate::infra::{
    checkpoint::{CheckpointManager, CONFIG_FILE, GRAPH_FILE, VOCAB_FILE},
    config_loader::print_config,
    metrics::MetricsLogger,
    runtime,
};
use crate::ml::kgc_trainer::{run_training, KgcTrainInputs};

pub struct KgcTrainUseCase {
    config: KgcConfig,
}

impl KgcTrainUseCase {
    pub fn new(config: KgcConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<BestScore> {
        let cfg = &self.config;

        // ── Step 1: Config ────────────────────────────────────────────────────
        cfg.validate()?;
        print_config(cfg)?;
        let kind = cfg.model_kind()?;

        // ── Step 2: Runtime ───────────────────────────────────────────────────
        let runtime = runtime::init(&cfg.env_args);

        // ── Step 3: Records ───────────────────────────────────────────────────
        let loader = KgLoader::new(
            &cfg.root_dir,
            &cfg.preprocessing_args.dataset,
            cfg.preprocessing_args.lower_case,
        );
        let train = loader.load_split(Split::Train)?;
        let dev = loader.load_split(Split::Valid)?;
        let test = loader.load_split(Split::Test)?;

        // ── Step 4: Vocabularies ──────────────────────────────────────────────
        let vocab = build_kg_vocab(&[train.as_slice(), dev.as_slice(), test.as_slice()]);
        let num_entities = vocab.in_word_vocab.len();
        let num_relations = vocab.out_word_vocab.len();

        // ── Step 5: Datasets and graph ───────────────────────────────────────
        let train = KgDataset::from_records(&train, &vocab);
        let dev = KgDataset::from_records(&dev, &vocab);
        let test = KgDataset::from_records(&test, &vocab);

        let graph = KgGraph::from_samples(train.samples(), num_entities, num_relations);
        tracing::info!("Background graph: {} edges, direction {:?}", graph.edge_count(), kind.direction);

        // ── Step 6: Side files ────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_args.out_dir, cfg.checkpoint_stem())?;
        ckpt.save_json(CONFIG_FILE, cfg)?;
        ckpt.save_json(VOCAB_FILE, &vocab)?;
        ckpt.save_json(GRAPH_FILE, &graph)?;
        let metrics = MetricsLogger::new(ckpt.dir(), ckpt.stem())?;

        // ── Step 7: Train ─────────────────────────────────────────────────────
        let inputs = KgcTrainInputs {
            model: cfg.model_config(num_entities, num_relations)?,
            edges: kind.gcn.then(|| graph.message_edges(kind.direction)),
            train,
            dev,
            test,
        };
        run_training(cfg, inputs, runtime, &ckpt, &metrics)
    }
}
