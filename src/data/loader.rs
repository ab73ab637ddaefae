// ============================================================
// Layer 4 — MWP Example Loader
// ============================================================
// Reads pre-built math-word-problem graphs from JSON-lines
// files:
//
//   {root_dir}/{topology_subdir}/train.jsonl
//   {root_dir}/{topology_subdir}/valid.jsonl   (optional)
//   {root_dir}/{topology_subdir}/test.jsonl
//
// One object per line:
//   {"graph": {"nodes": [...], "edges": [...], "sentence": [...]},
//    "output": "x = ( 3 + 5 ) * 2"}
//
// A malformed line, or a graph whose edges point outside its
// node list, is logged and skipped; a missing file is an error.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::example::MwpExample;
use crate::domain::traits::{ExampleSource, Split};

pub struct MawpsLoader {
    dir: PathBuf,
}

impl MawpsLoader {
    pub fn new(root_dir: impl AsRef<Path>, topology_subdir: &str) -> Self {
        Self { dir: root_dir.as_ref().join(topology_subdir) }
    }

    pub fn split_path(&self, split: Split) -> PathBuf {
        self.dir.join(format!("{}.jsonl", split.name()))
    }
}

impl ExampleSource for MawpsLoader {
    type Example = MwpExample;

    fn has_split(&self, split: Split) -> bool {
        self.split_path(split).is_file()
    }

    fn load_split(&self, split: Split) -> Result<Vec<MwpExample>> {
        let path = self.split_path(split);
        let examples: Vec<MwpExample> = read_json_lines(&path)?;
        let total = examples.len();

        let valid: Vec<MwpExample> = examples
            .into_iter()
            .enumerate()
            .filter_map(|(i, ex)| match ex.graph.validate() {
                Ok(()) => Some(ex),
                Err(e) => {
                    tracing::warn!("Skipping {} example {}: {}", split.name(), i, e);
                    None
                }
            })
            .collect();

        tracing::info!(
            "Loaded {} {} examples from '{}' ({} rejected)",
            valid.len(),
            split.name(),
            path.display(),
            total - valid.len(),
        );
        Ok(valid)
    }
}

/// Parse every non-blank line of `path` as a `T`.
/// Lines that fail to parse are logged and skipped.
pub fn read_json_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;

    let mut items = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(&line) {
            Ok(item) => items.push(item),
            Err(e) => tracing::warn!(
                "Skipping '{}' line {}: {}",
                path.display(),
                lineno + 1,
                e
            ),
        }
    }
    Ok(items)
}
