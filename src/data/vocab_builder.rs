// ============================================================
// Layer 4 — Vocabulary Builder
// ============================================================
// Counts symbols over the training examples and freezes them
// into a VocabModel.
//
// MWP:
//   input  = node tokens + sentence words
//   output = target tree symbols
//   edges  = every AMR edge label seen in any split
// With share_vocab the input and output counts are merged into
// one vocabulary, which the copy mechanism relies on.
//
// KG completion:
//   input  = entities, output = relations, in first-seen order
//   over every split (the ranking files name entities that may
//   never occur in training).

use anyhow::Result;
use std::collections::{BTreeSet, HashMap};

use crate::data::preprocessor::Preprocessor;
use crate::domain::example::{KgRecord, MwpExample};
use crate::domain::vocab::{Vocab, VocabModel};

pub struct MwpVocabBuilder {
    min_freq:    usize,
    share_vocab: bool,
    pre:         Preprocessor,
}

impl MwpVocabBuilder {
    pub fn new(min_freq: usize, share_vocab: bool, pre: Preprocessor) -> Self {
        Self { min_freq, share_vocab, pre }
    }

    /// `train` feeds the word counts; `all` (every split) only
    /// feeds the edge-label set.
    pub fn build(&self, train: &[MwpExample], all: &[&[MwpExample]]) -> Result<VocabModel> {
        let mut in_counts: HashMap<String, usize> = HashMap::new();
        let mut out_counts: HashMap<String, usize> = HashMap::new();

        for ex in train {
            for node in &ex.graph.nodes {
                *in_counts.entry(self.pre.normalize(&node.token)).or_insert(0) += 1;
            }
            for fragment in &ex.graph.sentence {
                for word in self.pre.tokenize(fragment)? {
                    *in_counts.entry(word).or_insert(0) += 1;
                }
            }
            for symbol in self.pre.tokenize(&ex.output)? {
                *out_counts.entry(symbol).or_insert(0) += 1;
            }
        }

        let (in_word_vocab, out_word_vocab) = if self.share_vocab {
            for (symbol, count) in out_counts {
                *in_counts.entry(symbol).or_insert(0) += count;
            }
            let shared = Vocab::from_counts(&in_counts, self.min_freq);
            (shared.clone(), shared)
        } else {
            (
                Vocab::from_counts(&in_counts, self.min_freq),
                Vocab::from_counts(&out_counts, self.min_freq),
            )
        };

        let edge_vocab: Vec<String> = all
            .iter()
            .flat_map(|split| split.iter())
            .flat_map(|ex| ex.graph.edges.iter().map(|e| e.label.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        tracing::info!(
            "Vocabulary: {} input, {} output, {} edge labels (min_freq={}, shared={})",
            in_word_vocab.len(),
            out_word_vocab.len(),
            edge_vocab.len(),
            self.min_freq,
            self.share_vocab,
        );

        Ok(VocabModel { in_word_vocab, out_word_vocab, edge_vocab, share_vocab: self.share_vocab })
    }
}

/// Entity and relation vocabularies over every KG split.
pub fn build_kg_vocab(splits: &[&[KgRecord]]) -> VocabModel {
    let mut entities = Vocab::new();
    let mut relations = Vocab::new();

    for record in splits.iter().flat_map(|s| s.iter()) {
        for e in record.entities() {
            entities.add_symbol(e);
        }
        for r in record.relations() {
            relations.add_symbol(r);
        }
    }

    tracing::info!("KG vocabulary: {} entities, {} relations", entities.len(), relations.len());
    VocabModel {
        in_word_vocab:  entities,
        out_word_vocab: relations,
        edge_vocab:     Vec::new(),
        share_vocab:    false,
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::graph::{GraphData, GraphEdge, GraphNode};

    fn example(nodes: &[&str], label: &str, output: &str) -> MwpExample {
        MwpExample {
            graph: GraphData {
                nodes:    nodes.iter().map(|t| GraphNode::new(*t)).collect(),
                edges:    vec![GraphEdge { src: 0, dst: 1, label: label.to_string() }],
                sentence: vec!["Tom has apples".to_string()],
            },
            output: output.to_string(),
        }
    }

    #[test]
    fn test_shared_vocab_covers_inputs_and_outputs() {
        let train = vec![example(&["Tom", "apple"], ":arg0", "x = 3 + 5")];
        let model = MwpVocabBuilder::new(1, true, Preprocessor::new(true))
            .build(&train, &[&train])
            .unwrap();
        assert_eq!(model.in_word_vocab, model.out_word_vocab);
        for s in ["tom", "apple", "has", "apples", "x", "=", "3", "+", "5"] {
            assert!(model.in_word_vocab.contains(s), "missing {s}");
        }
        assert_eq!(model.edge_vocab, vec![":arg0"]);
    }

    #[test]
    fn test_separate_vocab_and_min_freq() {
        let train = vec![
            example(&["a", "b"], ":arg0", "x = 1"),
            example(&["a", "c"], ":arg1", "x = 2"),
        ];
        let test = vec![example(&["d", "e"], ":quant", "x = 9")];
        let model = MwpVocabBuilder::new(2, false, Preprocessor::new(true))
            .build(&train, &[&train, &test])
            .unwrap();
        assert!(model.in_word_vocab.contains("a"));
        assert!(!model.in_word_vocab.contains("b"));
        assert!(!model.in_word_vocab.contains("x"));
        assert!(model.out_word_vocab.contains("x"));
        assert!(!model.out_word_vocab.contains("1"));
        assert_eq!(model.edge_idx(":quant"), Some(2));
    }

    #[test]
    fn test_kg_vocab_spans_all_splits() {
        let train: Vec<KgRecord> = serde_json::from_str(
            r#"[{"e1": "a", "rel": "r1", "e2_multi1": "b c"}]"#,
        )
        .unwrap();
        let test: Vec<KgRecord> = serde_json::from_str(
            r#"[{"e1": "d", "e2": "a", "rel": "r2", "rel_eval": "r2_reverse", "e2_multi1": "a", "e2_multi2": "d"}]"#,
        )
        .unwrap();
        let model = build_kg_vocab(&[&train, &test]);
        // 4 specials + a b c d
        assert_eq!(model.in_word_vocab.len(), 8);
        assert_eq!(model.out_word_vocab.len(), 7);
        assert!(!model.in_word_vocab.contains("None"));
    }
}
