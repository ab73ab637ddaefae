// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per training epoch next to the checkpoint.
//
//   {out_dir}/{stem}_metrics.csv
//
//   epoch,train_loss,val_score,test_score
//   1,2.314500,,
//   15,0.874100,0.412000,0.398000
//
// Scores are empty on epochs that skip evaluation. For the
// graph-to-tree driver they are tree accuracies; for KG
// completion, MRR.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:      usize,
    /// Mean loss over the epoch's training batches
    pub train_loss: f64,
    pub val_score:  Option<f64>,
    pub test_score: Option<f64>,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train_loss: f64) -> Self {
        Self { epoch, train_loss, val_score: None, test_score: None }
    }

    pub fn with_scores(mut self, val_score: Option<f64>, test_score: Option<f64>) -> Self {
        self.val_score = val_score;
        self.test_score = test_score;
        self
    }

    fn csv_row(&self) -> String {
        let cell = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
        format!(
            "{},{:.6},{},{}",
            self.epoch,
            self.train_loss,
            cell(self.val_score),
            cell(self.test_score),
        )
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header only when the file is new, so reruns append.
    pub fn new(dir: impl AsRef<Path>, stem: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let csv_path = dir.join(format!("{stem}_metrics.csv"));
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "epoch,train_loss,val_score,test_score")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(f, "{}", m.csv_row())?;
        tracing::debug!("Logged epoch {} metrics: train_loss={:.4}", m.epoch, m.train_loss);
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}
