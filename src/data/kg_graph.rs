// ============================================================
// Layer 4 — Knowledge-Graph Background Graph
// ============================================================
// The graph a GCN-encoded KGC model propagates over. Built once
// from the training records (edge e1 → e for every e in
// e2_multi1, labelled by rel) and stored next to the checkpoint,
// so inference sees the same graph the model was trained on.
//
// Message passing uses mean aggregation per destination:
//
//   h'_v = tanh( W_self h_v + Σ_{u→v} norm(u→v) · (h_u ∘ r_{u→v}) )
//
// where norm(u→v) = 1 / in-degree(v). `direction` decides
// whether each edge is also traversed backwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::data::dataset::KgSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Every edge is traversed both ways.
    Undirected,
    /// Edges are traversed from head to tail only.
    Uni,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KgGraph {
    pub num_entities:  usize,
    pub num_relations: usize,
    /// (src, dst, relation), deduplicated and sorted.
    pub edges:         Vec<(usize, usize, usize)>,
}

/// Edge lists ready to be turned into tensors.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEdges {
    pub src:      Vec<usize>,
    pub dst:      Vec<usize>,
    pub relation: Vec<usize>,
    pub norm:     Vec<f32>,
}

impl MessageEdges {
    pub fn len(&self) -> usize {
        self.src.len()
    }

    pub fn is_empty(&self) -> bool {
        self.src.is_empty()
    }
}

impl KgGraph {
    pub fn from_samples(samples: &[KgSample], num_entities: usize, num_relations: usize) -> Self {
        let edges: BTreeSet<(usize, usize, usize)> = samples
            .iter()
            .flat_map(|s| s.e2_multi1.iter().map(move |&e2| (s.e1, e2, s.rel)))
            .collect();
        Self { num_entities, num_relations, edges: edges.into_iter().collect() }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges to propagate along, with mean-aggregation weights.
    pub fn message_edges(&self, direction: Direction) -> MessageEdges {
        let mut triples: Vec<(usize, usize, usize)> = self.edges.clone();
        if direction == Direction::Undirected {
            triples.extend(self.edges.iter().map(|&(s, d, r)| (d, s, r)));
        }

        let mut in_degree = vec![0usize; self.num_entities];
        for &(_, d, _) in &triples {
            if let Some(deg) = in_degree.get_mut(d) {
                *deg += 1;
            }
        }

        let mut out = MessageEdges { src: Vec::new(), dst: Vec::new(), relation: Vec::new(), norm: Vec::new() };
        for (s, d, r) in triples {
            if s >= self.num_entities || d >= self.num_entities || r >= self.num_relations {
                continue;
            }
            out.src.push(s);
            out.dst.push(d);
            out.relation.push(r);
            out.norm.push(1.0 / in_degree[d] as f32);
        }
        out
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn sample(e1: usize, rel: usize, tails: &[usize]) -> KgSample {
        KgSample { e1, rel, e2: None, rel_eval: None, e2_multi1: tails.to_vec(), e2_multi2: vec![] }
    }

    #[test]
    fn test_edges_from_known_tails_are_deduplicated() {
        let g = KgGraph::from_samples(&[sample(4, 5, &[6, 7]), sample(4, 5, &[6])], 8, 6);
        assert_eq!(g.edges, vec![(4, 6, 5), (4, 7, 5)]);
    }

    #[test]
    fn test_undirected_adds_reverse_and_normalises() {
        let g = KgGraph::from_samples(&[sample(4, 5, &[6, 7])], 8, 6);
        let uni = g.message_edges(Direction::Uni);
        assert_eq!(uni.len(), 2);
        assert_eq!(uni.norm, vec![1.0, 1.0]);

        let both = g.message_edges(Direction::Undirected);
        assert_eq!(both.len(), 4);
        // entity 4 receives from 6 and 7
        let into_4: Vec<f32> = (0..both.len()).filter(|&i| both.dst[i] == 4).map(|i| both.norm[i]).collect();
        assert_eq!(into_4, vec![0.5, 0.5]);
    }

    #[test]
    fn test_out_of_range_edges_are_skipped() {
        let g = KgGraph { num_entities: 2, num_relations: 1, edges: vec![(0, 1, 0), (0, 5, 0), (1, 0, 3)] };
        assert_eq!(g.message_edges(Direction::Uni).len(), 1);
    }
}
