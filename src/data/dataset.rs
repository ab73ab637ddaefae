// ============================================================
// Layer 4 — Datasets
// ============================================================
// Indexes raw examples against a frozen VocabModel and exposes
// them through Burn's Dataset trait.
//
//   MwpExample ──▶ MwpSample  (node ids, typed edges, target ids)
//   KgRecord   ──▶ KgSample   (entity / relation ids + filters)
//
// Samples keep the normalised node tokens as well as their ids:
// the batcher needs the tokens to build each batch's extended
// vocabulary for the copy mechanism.

use anyhow::Result;
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::Preprocessor;
use crate::domain::example::{KgRecord, MwpExample};
use crate::domain::graph::GraphNode;
use crate::domain::vocab::VocabModel;

// ─── MWP ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MwpSample {
    /// Nodes with normalised tokens.
    pub nodes:         Vec<GraphNode>,
    /// Node token ids in the input vocabulary.
    pub node_ids:      Vec<usize>,
    /// (src, dst, relation id).
    pub edges:         Vec<(usize, usize, usize)>,
    pub target_tokens: Vec<String>,
    /// Target ids in the output vocabulary.
    pub target_ids:    Vec<usize>,
}

impl MwpSample {
    pub fn from_example(ex: &MwpExample, vocab: &VocabModel, pre: &Preprocessor) -> Result<Self> {
        let nodes: Vec<GraphNode> = ex
            .graph
            .nodes
            .iter()
            .map(|n| GraphNode { token: pre.normalize(&n.token), node_type: n.node_type })
            .collect();
        let node_ids = nodes.iter().map(|n| vocab.in_word_vocab.get_symbol_idx(&n.token)).collect();

        let mut edges = Vec::with_capacity(ex.graph.edges.len());
        for e in &ex.graph.edges {
            match vocab.edge_idx(&e.label) {
                Some(rel) => edges.push((e.src, e.dst, rel)),
                None => tracing::debug!("Dropping edge with unknown label '{}'", e.label),
            }
        }

        let target_tokens = pre.tokenize(&ex.output)?;
        let target_ids = vocab.out_word_vocab.get_symbol_idx_for_list(&target_tokens);

        Ok(Self { nodes, node_ids, edges, target_tokens, target_ids })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

pub struct MwpDataset {
    samples: Vec<MwpSample>,
}

impl MwpDataset {
    pub fn new(samples: Vec<MwpSample>) -> Self {
        Self { samples }
    }

    pub fn from_examples(examples: &[MwpExample], vocab: &VocabModel, pre: &Preprocessor) -> Result<Self> {
        let samples = examples
            .iter()
            .map(|ex| MwpSample::from_example(ex, vocab, pre))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(samples))
    }

    pub fn samples(&self) -> &[MwpSample] {
        &self.samples
    }
}

impl Dataset<MwpSample> for MwpDataset {
    fn get(&self, index: usize) -> Option<MwpSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

// ─── KG completion ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KgSample {
    pub e1:        usize,
    pub rel:       usize,
    pub e2:        Option<usize>,
    pub rel_eval:  Option<usize>,
    /// Known tails of (e1, rel): training targets and tail filter.
    pub e2_multi1: Vec<usize>,
    /// Known heads of (e2, rel_eval): head filter.
    pub e2_multi2: Vec<usize>,
}

impl KgSample {
    pub fn from_record(record: &KgRecord, vocab: &VocabModel) -> Self {
        let entities = &vocab.in_word_vocab;
        let relations = &vocab.out_word_vocab;
        Self {
            e1:        entities.get_symbol_idx(&record.e1),
            rel:       relations.get_symbol_idx(&record.rel),
            e2:        record.tail().map(|e| entities.get_symbol_idx(e)),
            rel_eval:  record.reverse_relation().map(|r| relations.get_symbol_idx(r)),
            e2_multi1: record.known_tails().map(|e| entities.get_symbol_idx(e)).collect(),
            e2_multi2: record.known_heads().map(|e| entities.get_symbol_idx(e)).collect(),
        }
    }
}

pub struct KgDataset {
    samples: Vec<KgSample>,
}

impl KgDataset {
    pub fn new(samples: Vec<KgSample>) -> Self {
        Self { samples }
    }

    pub fn from_records(records: &[KgRecord], vocab: &VocabModel) -> Self {
        Self::new(records.iter().map(|r| KgSample::from_record(r, vocab)).collect())
    }

    pub fn samples(&self) -> &[KgSample] {
        &self.samples
    }
}

impl Dataset<KgSample> for KgDataset {
    fn get(&self, index: usize) -> Option<KgSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
