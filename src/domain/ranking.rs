//! Filtered rank metrics for link prediction.
//!
//! Every evaluation query is scored in two directions:
//!
//! 1. **Tail prediction** ("left"): score all `(e1, rel, ?)`, rank the true `e2`.
//! 2. **Head prediction** ("right"): score all `(e2, rel_eval, ?)`, rank the true `e1`.
//!
//! # Filtered setting
//!
//! Other entities known to complete the same query correctly are not
//! negatives. Before ranking, their scores are zeroed; the true answer's
//! own score is then written back unconditionally (it is usually a member of
//! its own filter set). Ranks are 1-based positions after a stable
//! descending sort, so ties go to the lower entity index.
//!
//! # Metrics
//!
//! | Metric | Description |
//! |--------|-------------|
//! | Hits@k | fraction of queries with rank <= k, for k = 1..=10 |
//! | MR     | mean rank |
//! | MRR    | mean of 1/rank |
//!
//! Each is reported per direction and over both directions combined.

use std::cmp::Ordering;

/// Hits are tracked for k = 1..=MAX_HITS_LEVEL.
pub const MAX_HITS_LEVEL: usize = 10;

/// Rank of `target` in `scores` under the filtered protocol.
///
/// `scores` is modified in place: every index in `filter` is set to zero,
/// then `scores[target]` is restored to its original value. Filter indices
/// outside `scores` are ignored.
///
/// # Panics
///
/// If `target` is out of range.
pub fn filtered_rank(scores: &mut [f32], target: usize, filter: &[usize]) -> usize {
    let target_value = scores[target];
    for &i in filter {
        if let Some(s) = scores.get_mut(i) {
            *s = 0.0;
        }
    }
    scores[target] = target_value;

    // Position in a stable descending sort: everything strictly greater,
    // plus equal scores at lower indices.
    let ahead = scores
        .iter()
        .enumerate()
        .filter(|&(i, s)| match s.total_cmp(&target_value) {
            Ordering::Greater => true,
            Ordering::Equal => i < target,
            Ordering::Less => false,
        })
        .count();
    ahead + 1
}

/// Ranks derived for one evaluation row, both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingRecord {
    /// Rank of the true tail given (head, relation).
    pub rank_left:  usize,
    /// Rank of the true head given (tail, reverse relation).
    pub rank_right: usize,
}

impl RankingRecord {
    /// Apply [`filtered_rank`] to both prediction rows of one query.
    pub fn from_predictions(
        tail_scores: &mut [f32],
        head_scores: &mut [f32],
        head:        usize,
        tail:        usize,
        tail_filter: &[usize],
        head_filter: &[usize],
    ) -> Self {
        Self {
            rank_left:  filtered_rank(tail_scores, tail, tail_filter),
            rank_right: filtered_rank(head_scores, head, head_filter),
        }
    }
}

/// Hits@k, mean rank and MRR over one list of ranks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RankMetrics {
    /// `hits[k - 1]` is Hits@k.
    pub hits:      [f64; MAX_HITS_LEVEL],
    pub mean_rank: f64,
    pub mrr:       f64,
    pub count:     usize,
}

impl RankMetrics {
    pub fn from_ranks(ranks: &[usize]) -> Self {
        if ranks.is_empty() {
            return Self::default();
        }
        let n = ranks.len() as f64;
        let mut hits = [0.0; MAX_HITS_LEVEL];
        for (level, h) in hits.iter_mut().enumerate() {
            *h = ranks.iter().filter(|&&r| r <= level + 1).count() as f64 / n;
        }
        Self {
            hits,
            mean_rank: ranks.iter().map(|&r| r as f64).sum::<f64>() / n,
            mrr:       ranks.iter().map(|&r| 1.0 / r as f64).sum::<f64>() / n,
            count:     ranks.len(),
        }
    }

    /// Hits@k for 1 <= k <= 10.
    pub fn hits_at(&self, k: usize) -> f64 {
        assert!((1..=MAX_HITS_LEVEL).contains(&k), "hits level {k} out of range");
        self.hits[k - 1]
    }
}

/// Running ranks for an evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct RankingAccumulator {
    ranks_left:  Vec<usize>,
    ranks_right: Vec<usize>,
}

impl RankingAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: RankingRecord) {
        self.ranks_left.push(record.rank_left);
        self.ranks_right.push(record.rank_right);
    }

    pub fn len(&self) -> usize {
        self.ranks_left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks_left.is_empty()
    }

    pub fn report(&self) -> RankingReport {
        let combined: Vec<usize> = self
            .ranks_left
            .iter()
            .zip(&self.ranks_right)
            .flat_map(|(&l, &r)| [l, r])
            .collect();
        RankingReport {
            left:     RankMetrics::from_ranks(&self.ranks_left),
            right:    RankMetrics::from_ranks(&self.ranks_right),
            combined: RankMetrics::from_ranks(&combined),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RankingReport {
    pub left:     RankMetrics,
    pub right:    RankMetrics,
    pub combined: RankMetrics,
}

impl RankingReport {
    /// Human-readable lines in left / right / combined order.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(3 * MAX_HITS_LEVEL + 6);
        for level in 0..MAX_HITS_LEVEL {
            out.push(format!("Hits left @{}: {}", level + 1, self.left.hits[level]));
            out.push(format!("Hits right @{}: {}", level + 1, self.right.hits[level]));
            out.push(format!("Hits @{}: {}", level + 1, self.combined.hits[level]));
        }
        out.push(format!("Mean rank left: {}", self.left.mean_rank));
        out.push(format!("Mean rank right: {}", self.right.mean_rank));
        out.push(format!("Mean rank: {}", self.combined.mean_rank));
        out.push(format!("Mean reciprocal rank left: {}", self.left.mrr));
        out.push(format!("Mean reciprocal rank right: {}", self.right.mrr));
        out.push(format!("Mean reciprocal rank: {}", self.combined.mrr));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_rank_skips_known_answers() {
        // entity 2 is the target; 0 and 3 are other known answers
        let mut scores = vec![0.9, 0.1, 0.5, 0.8, 0.6];
        let rank = filtered_rank(&mut scores, 2, &[0, 2, 3]);
        // only entity 4 (0.6) remains above 0.5
        assert_eq!(rank, 2);
        assert_eq!(scores, vec![0.0, 0.1, 0.5, 0.0, 0.6]);
    }

    #[test]
    fn test_target_restored_even_when_filtered() {
        let mut scores = vec![0.2, 0.7];
        assert_eq!(filtered_rank(&mut scores, 1, &[1]), 1);
        assert_eq!(scores[1], 0.7);
    }

    #[test]
    fn test_ties_go_to_lower_index() {
        let mut scores = vec![0.5, 0.5, 0.5];
        assert_eq!(filtered_rank(&mut scores.clone(), 0, &[]), 1);
        assert_eq!(filtered_rank(&mut scores, 2, &[]), 3);
    }

    #[test]
    fn test_out_of_range_filter_ignored() {
        let mut scores = vec![0.3, 0.4];
        assert_eq!(filtered_rank(&mut scores, 0, &[7]), 2);
    }

    #[test]
    fn test_hits_indicator_matches_rank() {
        let m = RankMetrics::from_ranks(&[3]);
        for k in 1..=MAX_HITS_LEVEL {
            assert_eq!(m.hits_at(k), if k >= 3 { 1.0 } else { 0.0 });
        }
    }

    #[test]
    fn test_mrr_of_fixed_ranks() {
        let m = RankMetrics::from_ranks(&[1, 2, 5, 10]);
        let expected = (1.0 + 0.5 + 0.2 + 0.1) / 4.0;
        assert!((m.mrr - expected).abs() < 1e-12);
        assert!((m.mean_rank - 4.5).abs() < 1e-12);
        assert!((m.hits_at(1) - 0.25).abs() < 1e-12);
        assert!((m.hits_at(10) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_accumulator_combines_both_directions() {
        let mut acc = RankingAccumulator::new();
        acc.push(RankingRecord { rank_left: 1, rank_right: 2 });
        acc.push(RankingRecord { rank_left: 5, rank_right: 10 });
        let report = acc.report();
        assert_eq!(report.left.count, 2);
        assert_eq!(report.combined.count, 4);
        assert!((report.left.mrr - 0.6).abs() < 1e-12);
        assert!((report.right.mrr - 0.3).abs() < 1e-12);
        assert!((report.combined.mrr - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_record_ranks_each_direction_independently() {
        let mut tail = vec![0.1, 0.9, 0.4];
        let mut head = vec![0.8, 0.3, 0.6];
        // true triple (0, r, 2); entity 1 is another known tail
        let rec = RankingRecord::from_predictions(&mut tail, &mut head, 0, 2, &[1, 2], &[0]);
        assert_eq!(rec.rank_left, 1);
        assert_eq!(rec.rank_right, 1);
    }

    #[test]
    fn test_empty_report_is_default() {
        let report = RankingAccumulator::new().report();
        assert_eq!(report.combined.count, 0);
        assert_eq!(report.combined.mrr, 0.0);
    }
}
