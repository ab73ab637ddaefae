// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder,
// plus the JSON side files inference needs to rebuild a model.
//
// Layout for a run stem such as "best_model":
//
//   {out_dir}/
//     best_model.mpk            ← retained weights
//     best_model_config.json    ← run configuration
//     best_model_vocab.json     ← VocabModel
//     best_model_graph.json     ← KG background graph (KGC only)
//
// Loading fails when the rebuilt architecture does not match the
// saved record, so the config side file must be read first.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::PathBuf};

use crate::domain::best_model::{BestModelTracker, BestScore, EvalSchedule};

/// Side file holding the run configuration.
pub const CONFIG_FILE: &str = "config";
/// Side file holding the VocabModel.
pub const VOCAB_FILE: &str = "vocab";
/// Side file holding the KG background graph.
pub const GRAPH_FILE: &str = "graph";
/// Extension CompactRecorder (named msgpack) gives its files.
pub const WEIGHTS_EXT: &str = "mpk";

pub struct CheckpointManager {
    dir:  PathBuf,
    stem: String,
}

impl CheckpointManager {
    /// Creates `dir` if it does not exist yet.
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, stem: stem.into() })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Full weight file path. The extension is spelled out because the
    /// recorder replaces whatever follows the last dot, and KGC stems
    /// end in dropout rates such as `_0.2_0.3`.
    pub fn weights_path(&self) -> PathBuf {
        self.dir.join(format!("{}.{WEIGHTS_EXT}", self.stem))
    }

    fn side_path(&self, kind: &str) -> PathBuf {
        self.dir.join(format!("{}_{kind}.json", self.stem))
    }

    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M) -> Result<()> {
        let path = self.weights_path();
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;
        tracing::info!("Saved model weights to '{}'", path.display());
        Ok(())
    }

    /// Persist the model the tracker retained, never the live one.
    pub fn save_best<B: Backend, M: Module<B>>(
        &self,
        tracker:    BestModelTracker<M>,
        schedule:   EvalSchedule,
        max_epochs: usize,
    ) -> Result<(BestScore, M)> {
        let (best, model) = tracker.into_best(schedule, max_epochs)?;
        self.save_model(&model)?;
        Ok((best, model))
    }

    /// Restore weights into a freshly built `model` of the same architecture.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let path = self.weights_path();
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;
        tracing::info!("Loaded model weights from '{}'", path.display());
        Ok(model.load_record(record))
    }

    pub fn save_json<T: Serialize>(&self, kind: &str, value: &T) -> Result<()> {
        let path = self.side_path(kind);
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&path, json).with_context(|| format!("Cannot write '{}'", path.display()))?;
        tracing::debug!("Saved side file '{}'", path.display());
        Ok(())
    }

    pub fn load_json<T: DeserializeOwned>(&self, kind: &str) -> Result<T> {
        let path = self.side_path(kind);
        let json = fs::read_to_string(&path).with_context(|| {
            format!("Cannot read '{}'. Make sure training finished before inference.", path.display())
        })?;
        serde_json::from_str(&json).with_context(|| format!("Malformed side file '{}'", path.display()))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vocab::Vocab;
    use burn::{backend::NdArray, nn::LinearConfig};

    type TestBackend = NdArray;

    #[test]
    fn test_side_file_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path().join("out"), "run").unwrap();

        let mut vocab = Vocab::new();
        vocab.add_symbol("x");
        ckpt.save_json(VOCAB_FILE, &vocab).unwrap();
        assert!(tmp.path().join("out/run_vocab.json").exists());

        let loaded: Vocab = ckpt.load_json(VOCAB_FILE).unwrap();
        assert_eq!(loaded.index_of("x"), vocab.index_of("x"));
    }

    #[test]
    fn test_missing_side_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path(), "run").unwrap();
        assert!(ckpt.load_json::<Vocab>(GRAPH_FILE).is_err());
    }

    #[test]
    fn test_model_weights_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path(), "linear").unwrap();
        let device = Default::default();

        let model = LinearConfig::new(3, 2).init::<TestBackend>(&device);
        ckpt.save_model(&model).unwrap();

        let fresh = LinearConfig::new(3, 2).init::<TestBackend>(&device);
        let restored = ckpt.load_model(fresh, &device).unwrap();

        let a: Vec<f32> = model.weight.val().into_data().iter::<f32>().collect();
        let b: Vec<f32> = restored.weight.val().into_data().iter::<f32>().collect();
        // half-precision storage
        assert!(a.iter().zip(&b).all(|(x, y)| (x - y).abs() < 1e-2));
    }

    #[test]
    fn test_dotted_stems_keep_distinct_weight_files() {
        let tmp = tempfile::tempdir().unwrap();
        let device = Default::default();
        let a = CheckpointManager::new(tmp.path(), "kinship_distmult_uni_0.2_0.3").unwrap();
        let b = CheckpointManager::new(tmp.path(), "kinship_distmult_uni_0.2_0.5").unwrap();

        a.save_model(&LinearConfig::new(3, 2).init::<TestBackend>(&device)).unwrap();
        b.save_model(&LinearConfig::new(3, 2).init::<TestBackend>(&device)).unwrap();

        assert!(tmp.path().join("kinship_distmult_uni_0.2_0.3.mpk").exists());
        assert!(tmp.path().join("kinship_distmult_uni_0.2_0.5.mpk").exists());
        assert_eq!(a.weights_path(), tmp.path().join("kinship_distmult_uni_0.2_0.3.mpk"));
    }
}
