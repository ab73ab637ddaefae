// ============================================================
// Layer 2 — Run Configuration
// ============================================================
// Every hyperparameter of a run, read from one nested JSON
// file. Top-level groups:
//
//   env_args            seed, device, loader workers
//   model_args          architecture
//   preprocessing_args  vocabulary / dataset options
//   training_args       optimisation and evaluation cadence
//   checkpoint_args     where the best model is written
//   inference_args      decoding and ad hoc queries
//
// Every struct is #[serde(default)] so a config only needs
// the keys it wants to change. `validate()` rejects
// combinations that would fail later in the run.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::domain::best_model::EvalSchedule;
use crate::domain::example::KgRecord;
use crate::ml::graph_encoder::GraphEmbeddingKind;
use crate::ml::kgc_model::{KgcModelConfig, KgcModelKind};

// ─── Shared groups ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvArgs {
    pub seed:        u64,
    /// -1 selects the CPU device.
    pub gpuid:       i32,
    pub num_workers: usize,
}

impl Default for EnvArgs {
    fn default() -> Self {
        Self { seed: 1234, gpuid: -1, num_workers: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingArgs {
    pub min_freq:        usize,
    pub lower_case:      bool,
    /// Fraction of train carved out as validation when the
    /// dataset has no validation file.
    pub val_split_ratio: f64,
    /// KG dataset directory name under the root dir.
    pub dataset:         String,
}

impl Default for PreprocessingArgs {
    fn default() -> Self {
        Self {
            min_freq:        1,
            lower_case:      true,
            val_split_ratio: 0.1,
            dataset:         "kinship".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingArgs {
    pub batch_size:         usize,
    pub learning_rate:      f64,
    pub weight_decay:       f32,
    /// Gradients are clipped by value to [-grad_clip, grad_clip].
    pub grad_clip:          f32,
    pub max_epochs:         usize,
    /// Parameters are initialised in [-init_weight, init_weight].
    pub init_weight:        f64,
    pub eval_warmup_epochs: usize,
    pub eval_every:         usize,
    pub label_smoothing:    f64,
}

impl Default for TrainingArgs {
    fn default() -> Self {
        Self {
            batch_size:         20,
            learning_rate:      1e-3,
            weight_decay:       0.0,
            grad_clip:          5.0,
            max_epochs:         150,
            init_weight:        0.08,
            eval_warmup_epochs: 10,
            eval_every:         5,
            label_smoothing:    0.1,
        }
    }
}

impl TrainingArgs {
    pub fn schedule(&self) -> EvalSchedule {
        EvalSchedule::new(self.eval_warmup_epochs, self.eval_every)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("training_args.batch_size must be positive");
        }
        if !(self.learning_rate > 0.0) {
            bail!("training_args.learning_rate must be positive");
        }
        if !(self.grad_clip > 0.0) {
            bail!("training_args.grad_clip must be positive");
        }
        let schedule = self.schedule();
        if !schedule.evaluates_within(self.max_epochs) {
            bail!(
                "training_args.max_epochs = {} never reaches an evaluation epoch \
                 (evaluation runs every {} epochs after epoch {}), so no best model \
                 would ever be saved",
                self.max_epochs, self.eval_every, self.eval_warmup_epochs,
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointArgs {
    pub out_dir:         String,
    pub checkpoint_name: String,
}

impl Default for CheckpointArgs {
    fn default() -> Self {
        Self {
            out_dir:         "checkpoints".to_string(),
            checkpoint_name: "best_model".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceArgs {
    pub beam_size:      usize,
    pub max_decode_len: usize,
    /// Predictions reported per ad hoc query.
    pub top_k:          usize,
    /// Ad hoc KG completion queries.
    pub queries:        Vec<KgRecord>,
}

impl Default for InferenceArgs {
    fn default() -> Self {
        Self { beam_size: 4, max_decode_len: 50, top_k: 5, queries: Vec::new() }
    }
}

// ─── MWP (graph-to-tree) ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConstructionShare {
    pub root_dir:        String,
    pub topology_subdir: String,
    pub share_vocab:     bool,
}

impl Default for GraphConstructionShare {
    fn default() -> Self {
        Self {
            root_dir:        "data/mawps".to_string(),
            topology_subdir: "amr".to_string(),
            share_vocab:     true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConstructionArgs {
    pub graph_construction_share: GraphConstructionShare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphInitializationArgs {
    pub input_size: usize,
}

impl Default for GraphInitializationArgs {
    fn default() -> Self {
        Self { input_size: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphEmbeddingArgs {
    pub num_layers:  usize,
    pub hidden_size: usize,
    pub feat_drop:   f64,
    /// Relation count for RGCN; defaults to the edge-label count.
    pub num_rels:    Option<usize>,
}

impl Default for GraphEmbeddingArgs {
    fn default() -> Self {
        Self { num_layers: 2, hidden_size: 300, feat_drop: 0.0, num_rels: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderShare {
    pub use_copy:    bool,
    pub input_size:  usize,
    pub hidden_size: usize,
    pub dropout:     f64,
}

impl Default for DecoderShare {
    fn default() -> Self {
        Self { use_copy: true, input_size: 300, hidden_size: 300, dropout: 0.3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderArgs {
    pub rnn_decoder_share: DecoderShare,
    pub num_layers:        usize,
    pub num_heads:         usize,
    pub ff_size:           usize,
}

impl Default for DecoderArgs {
    fn default() -> Self {
        Self {
            rnn_decoder_share: DecoderShare::default(),
            num_layers:        2,
            num_heads:         4,
            ff_size:           600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MawpsModelArgs {
    pub graph_construction_name:   String,
    pub graph_embedding_name:      String,
    pub graph_construction_args:   GraphConstructionArgs,
    pub graph_initialization_args: GraphInitializationArgs,
    pub graph_embedding_args:      GraphEmbeddingArgs,
    pub decoder_args:              DecoderArgs,
}

impl Default for MawpsModelArgs {
    fn default() -> Self {
        Self {
            graph_construction_name:   "amr".to_string(),
            graph_embedding_name:      "rgcn".to_string(),
            graph_construction_args:   GraphConstructionArgs::default(),
            graph_initialization_args: GraphInitializationArgs::default(),
            graph_embedding_args:      GraphEmbeddingArgs::default(),
            decoder_args:              DecoderArgs::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MawpsConfig {
    pub env_args:           EnvArgs,
    pub model_args:         MawpsModelArgs,
    pub preprocessing_args: PreprocessingArgs,
    pub training_args:      TrainingArgs,
    pub checkpoint_args:    CheckpointArgs,
    pub inference_args:     InferenceArgs,
}

impl MawpsConfig {
    pub fn graph_share(&self) -> &GraphConstructionShare {
        &self.model_args.graph_construction_args.graph_construction_share
    }

    pub fn use_copy(&self) -> bool {
        self.model_args.decoder_args.rnn_decoder_share.use_copy
    }

    pub fn graph_embedding_kind(&self) -> Result<GraphEmbeddingKind> {
        Ok(self.model_args.graph_embedding_name.parse::<GraphEmbeddingKind>()?)
    }

    pub fn validate(&self) -> Result<()> {
        self.training_args.validate()?;
        self.graph_embedding_kind()?;

        let decoder = &self.model_args.decoder_args;
        if self.use_copy() && !self.graph_share().share_vocab {
            bail!("decoder use_copy requires graph_construction_share.share_vocab = true");
        }
        if decoder.num_heads == 0 || decoder.rnn_decoder_share.hidden_size % decoder.num_heads != 0 {
            bail!(
                "decoder hidden_size {} must be divisible by num_heads {}",
                decoder.rnn_decoder_share.hidden_size, decoder.num_heads,
            );
        }
        if self.model_args.graph_embedding_args.hidden_size != decoder.rnn_decoder_share.hidden_size {
            bail!("graph_embedding_args.hidden_size must equal the decoder hidden_size");
        }
        if self.inference_args.beam_size == 0 {
            bail!("inference_args.beam_size must be at least 1");
        }
        Ok(())
    }
}

// ─── KG completion ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphEmbeddingShare {
    pub direction_option: String,
    pub num_layers:       usize,
}

impl Default for GraphEmbeddingShare {
    fn default() -> Self {
        Self { direction_option: "undirected".to_string(), num_layers: 1 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KgGraphEmbeddingArgs {
    pub graph_embedding_share: GraphEmbeddingShare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KgcModelArgs {
    pub model:                String,
    pub embedding_dim:        usize,
    pub input_drop:           f64,
    pub hidden_drop:          f64,
    pub graph_embedding_args: KgGraphEmbeddingArgs,
}

impl Default for KgcModelArgs {
    fn default() -> Self {
        Self {
            model:                "gcn_distmult".to_string(),
            embedding_dim:        200,
            input_drop:           0.2,
            hidden_drop:          0.3,
            graph_embedding_args: KgGraphEmbeddingArgs::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KgcConfig {
    pub env_args:           EnvArgs,
    pub model_args:         KgcModelArgs,
    pub preprocessing_args: PreprocessingArgs,
    pub training_args:      TrainingArgs,
    pub checkpoint_args:    CheckpointArgs,
    pub inference_args:     InferenceArgs,
    /// Directory holding one sub-directory per KG dataset.
    pub root_dir:           String,
}

impl Default for KgcConfig {
    fn default() -> Self {
        Self {
            env_args:           EnvArgs::default(),
            model_args:         KgcModelArgs::default(),
            preprocessing_args: PreprocessingArgs::default(),
            training_args:      TrainingArgs { batch_size: 128, eval_warmup_epochs: 0, ..TrainingArgs::default() },
            checkpoint_args:    CheckpointArgs { out_dir: "saved_models".to_string(), ..CheckpointArgs::default() },
            inference_args:     InferenceArgs::default(),
            root_dir:           "data/kg_completion".to_string(),
        }
    }
}

impl KgcConfig {
    pub fn model_kind(&self) -> Result<KgcModelKind> {
        Ok(KgcModelKind::parse(
            &self.model_args.model,
            &self.model_args.graph_embedding_args.graph_embedding_share.direction_option,
        )?)
    }

    /// `{model}_{direction}_{input_drop}_{hidden_drop}`
    pub fn model_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.model_args.model,
            self.model_args.graph_embedding_args.graph_embedding_share.direction_option,
            self.model_args.input_drop,
            self.model_args.hidden_drop,
        )
    }

    /// `{dataset}_{model_name}`, the checkpoint file stem.
    pub fn checkpoint_stem(&self) -> String {
        format!("{}_{}", self.preprocessing_args.dataset, self.model_name())
    }

    /// Model architecture for the given vocabulary sizes.
    pub fn model_config(&self, num_entities: usize, num_relations: usize) -> Result<KgcModelConfig> {
        let kind = self.model_kind()?;
        let share = &self.model_args.graph_embedding_args.graph_embedding_share;
        Ok(KgcModelConfig::new(num_entities, num_relations, self.model_args.embedding_dim, kind.decoder)
            .with_gcn_layers(if kind.gcn { share.num_layers } else { 0 })
            .with_input_drop(self.model_args.input_drop)
            .with_hidden_drop(self.model_args.hidden_drop))
    }

    pub fn validate(&self) -> Result<()> {
        self.training_args.validate()?;
        let kind = self.model_kind()?;
        if kind.is_complex() && self.model_args.embedding_dim % 2 != 0 {
            bail!("complex decoder needs an even embedding_dim, got {}", self.model_args.embedding_dim);
        }
        if !(0.0..1.0).contains(&self.training_args.label_smoothing) {
            bail!("training_args.label_smoothing must be in [0, 1)");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_takes_defaults() {
        let cfg: MawpsConfig = serde_json::from_str(
            r#"{"training_args": {"max_epochs": 20, "grad_clip": 1.0},
                "model_args": {"graph_embedding_name": "gcn"}}"#,
        )
        .unwrap();
        assert_eq!(cfg.training_args.max_epochs, 20);
        assert_eq!(cfg.training_args.batch_size, 20);
        assert_eq!(cfg.inference_args.beam_size, 4);
        assert!(cfg.use_copy());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_schedule_that_never_evaluates_is_rejected() {
        let mut cfg = MawpsConfig::default();
        cfg.training_args.max_epochs = 12;
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("never reaches an evaluation epoch"), "{err}");
    }

    #[test]
    fn test_unsupported_encoder_fails_fast() {
        let mut cfg = MawpsConfig::default();
        cfg.model_args.graph_embedding_name = "gat".to_string();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("not implemented"), "{err}");
    }

    #[test]
    fn test_copy_requires_shared_vocab() {
        let mut cfg = MawpsConfig::default();
        cfg.model_args.graph_construction_args.graph_construction_share.share_vocab = false;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_kgc_checkpoint_stem() {
        let cfg = KgcConfig::default();
        assert_eq!(cfg.checkpoint_stem(), "kinship_gcn_distmult_undirected_0.2_0.3");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_kgc_rejects_odd_complex_dim() {
        let mut cfg = KgcConfig::default();
        cfg.model_args.model = "complex".to_string();
        cfg.model_args.embedding_dim = 201;
        assert!(cfg.validate().is_err());
    }
}
