// ============================================================
// Layer 4 — Knowledge-Graph Record Loader
// ============================================================
// Reads the e1rel_to_e2 JSON-lines files of one KG dataset:
//
//   {root_dir}/{dataset}/e1rel_to_e2_train.json
//   {root_dir}/{dataset}/e1rel_to_e2_ranking_dev.json
//   {root_dir}/{dataset}/e1rel_to_e2_ranking_test.json
//
// Training records group every known tail of (e1, rel) in
// `e2_multi1` and carry e2 = "None"; ranking records name one
// concrete triple plus both filter sets.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

use crate::data::loader::read_json_lines;
use crate::domain::example::KgRecord;
use crate::domain::traits::{ExampleSource, Split};

pub struct KgLoader {
    dir:        PathBuf,
    lower_case: bool,
}

impl KgLoader {
    pub fn new(root_dir: impl AsRef<Path>, dataset: &str, lower_case: bool) -> Self {
        Self { dir: root_dir.as_ref().join(dataset), lower_case }
    }

    pub fn split_path(&self, split: Split) -> PathBuf {
        let file = match split {
            Split::Train => "e1rel_to_e2_train.json",
            Split::Valid => "e1rel_to_e2_ranking_dev.json",
            Split::Test  => "e1rel_to_e2_ranking_test.json",
        };
        self.dir.join(file)
    }
}

impl ExampleSource for KgLoader {
    type Example = KgRecord;

    fn has_split(&self, split: Split) -> bool {
        self.split_path(split).is_file()
    }

    fn load_split(&self, split: Split) -> Result<Vec<KgRecord>> {
        let path = self.split_path(split);
        let mut records: Vec<KgRecord> = read_json_lines(&path)?;

        if self.lower_case {
            records.iter_mut().for_each(KgRecord::lowercase);
        }

        // ranking needs a concrete triple in both directions
        if split != Split::Train {
            if let Some(bad) = records.iter().position(|r| r.tail().is_none() || r.reverse_relation().is_none()) {
                bail!(
                    "'{}' record {} has no e2 / rel_eval; ranking files need both",
                    path.display(),
                    bad + 1
                );
            }
        }

        tracing::info!("Loaded {} {} KG records from '{}'", records.len(), split.name(), path.display());
        Ok(records)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_reads_each_split_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("kinship");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("e1rel_to_e2_train.json"),
            r#"{"e1": "Person1", "e2": "None", "rel": "term1", "rel_eval": "None", "e2_multi1": "person2 Person3", "e2_multi2": "None"}"#,
        )
        .unwrap();
        fs::write(
            dir.join("e1rel_to_e2_ranking_dev.json"),
            r#"{"e1": "person1", "e2": "person2", "rel": "term1", "rel_eval": "term1_reverse", "e2_multi1": "person2 person3", "e2_multi2": "person1"}"#,
        )
        .unwrap();

        let loader = KgLoader::new(tmp.path(), "kinship", true);
        let train = loader.load_split(Split::Train).unwrap();
        assert_eq!(train[0].e1, "person1");
        assert_eq!(train[0].tail(), None);
        assert_eq!(train[0].known_tails().collect::<Vec<_>>(), vec!["person2", "person3"]);

        let dev = loader.load_split(Split::Valid).unwrap();
        assert_eq!(dev[0].reverse_relation(), Some("term1_reverse"));
        assert!(!loader.has_split(Split::Test));
    }

    #[test]
    fn test_ranking_file_without_tail_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("fb");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("e1rel_to_e2_ranking_test.json"), r#"{"e1": "a", "rel": "r"}"#).unwrap();
        let loader = KgLoader::new(tmp.path(), "fb", false);
        assert!(loader.load_split(Split::Test).is_err());
    }
}
