// ============================================================
// Layer 5 — KG Completion Inferencer
// ============================================================
// Read-only adapter around a trained KgcModel. Takes raw query
// records (the same JSON shape as the dataset files), resolves
// names through the saved vocabularies and scores every entity
// as the tail of (e1, rel, ?) over the saved background graph.
//
// Per query it reports the top-k tails and, when the record names
// its true e2, that tail's filtered rank.

use burn::prelude::*;
use std::fmt;

use crate::data::{dataset::KgSample, kg_graph::MessageEdges};
use crate::domain::{
    example::KgRecord,
    ranking::filtered_rank,
    vocab::{VocabModel, UNK_IDX},
};
use crate::ml::{
    kgc_evaluator::score_rows,
    kgc_model::{KgGraphTensors, KgcModel},
};

/// Entity indices below this are reserved specials, never predicted.
const FIRST_ENTITY: usize = UNK_IDX + 1;

#[derive(Debug, Clone, PartialEq)]
pub struct TailPrediction {
    pub e1:   String,
    pub rel:  String,
    /// (entity, probability), best first.
    pub top:  Vec<(String, f32)>,
    /// Filtered rank of the record's e2, when it names one.
    pub rank: Option<usize>,
}

impl fmt::Display for TailPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, ?)", self.e1, self.rel)?;
        if let Some(rank) = self.rank {
            write!(f, " rank={rank}")?;
        }
        for (i, (entity, p)) in self.top.iter().enumerate() {
            write!(f, "\n  {:>2}. {entity} ({p:.4})", i + 1)?;
        }
        Ok(())
    }
}

pub struct KgcInferencer<B: Backend> {
    model:  KgcModel<B>,
    vocab:  VocabModel,
    graph:  Option<KgGraphTensors<B>>,
    device: B::Device,
}

impl<B: Backend> KgcInferencer<B> {
    pub fn new(model: KgcModel<B>, vocab: VocabModel, edges: Option<&MessageEdges>, device: B::Device) -> Self {
        let graph = edges.and_then(|e| KgGraphTensors::from_edges(e, &device));
        Self { model, vocab, graph, device }
    }

    pub fn model(&self) -> &KgcModel<B> {
        &self.model
    }

    pub fn vocab(&self) -> &VocabModel {
        &self.vocab
    }

    pub fn graph(&self) -> Option<&KgGraphTensors<B>> {
        self.graph.as_ref()
    }

    pub fn predict(&self, records: &[KgRecord], top_k: usize) -> Vec<TailPrediction> {
        if records.is_empty() {
            return Vec::new();
        }
        let samples: Vec<KgSample> = records.iter().map(|r| KgSample::from_record(r, &self.vocab)).collect();
        for (record, sample) in records.iter().zip(&samples) {
            if sample.e1 == UNK_IDX || sample.rel == UNK_IDX {
                tracing::warn!("Query ({}, {}) uses a name unseen in training", record.e1, record.rel);
            }
        }

        let ids = |f: fn(&KgSample) -> usize| {
            let flat: Vec<i32> = samples.iter().map(|s| f(s) as i32).collect();
            Tensor::<B, 1, Int>::from_ints(TensorData::new(flat, [samples.len()]), &self.device)
        };
        let rows = score_rows(self.model.predict(ids(|s| s.e1), ids(|s| s.rel), self.graph.as_ref()));

        records
            .iter()
            .zip(&samples)
            .zip(rows)
            .map(|((record, sample), row)| self.describe(record, sample, row, top_k))
            .collect()
    }

    fn describe(&self, record: &KgRecord, sample: &KgSample, row: Vec<f32>, top_k: usize) -> TailPrediction {
        let entities = &self.vocab.in_word_vocab;

        let mut order: Vec<usize> = (FIRST_ENTITY..row.len()).collect();
        order.sort_by(|&a, &b| row[b].total_cmp(&row[a]));
        let top = order
            .into_iter()
            .take(top_k)
            .map(|i| (entities.symbol(i).unwrap_or_default().to_string(), row[i]))
            .collect();

        let rank = sample
            .e2
            .filter(|&e2| e2 < row.len())
            .map(|e2| filtered_rank(&mut row.clone(), e2, &sample.e2_multi1));

        TailPrediction { e1: record.e1.clone(), rel: record.rel.clone(), top, rank }
    }
}
