// ============================================================
// Layer 3 — Evaluation Schedule & Best-Model Retention
// ============================================================
// Both training drivers evaluate on a fixed cadence and keep
// the model with the best validation score seen so far.
//
//   EvalSchedule      — which epochs trigger evaluation
//   BestModelTracker  — holds an independent copy of the best
//                       model, not a handle to the live one
//
// The tracker is generic over the model type so it can be
// tested with plain values.

use crate::domain::error::TrainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalSchedule {
    /// Evaluation only happens strictly after this epoch.
    pub warmup_epochs: usize,
    /// ...and only on multiples of this.
    pub eval_every:    usize,
}

impl EvalSchedule {
    pub fn new(warmup_epochs: usize, eval_every: usize) -> Self {
        Self { warmup_epochs, eval_every }
    }

    pub fn should_evaluate(&self, epoch: usize) -> bool {
        self.eval_every > 0 && epoch > self.warmup_epochs && epoch % self.eval_every == 0
    }

    /// The first epoch that triggers evaluation, if any.
    pub fn first_eval_epoch(&self) -> Option<usize> {
        if self.eval_every == 0 {
            return None;
        }
        Some((self.warmup_epochs / self.eval_every + 1) * self.eval_every)
    }

    /// Whether a run of `max_epochs` evaluates at least once.
    pub fn evaluates_within(&self, max_epochs: usize) -> bool {
        self.first_eval_epoch().is_some_and(|e| e <= max_epochs)
    }
}

/// Scores recorded alongside a retained model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestScore {
    pub epoch: usize,
    pub val:   f64,
    pub test:  Option<f64>,
}

#[derive(Debug, Clone)]
pub struct BestModelTracker<M> {
    best: Option<(BestScore, M)>,
}

impl<M> Default for BestModelTracker<M> {
    fn default() -> Self {
        Self { best: None }
    }
}

impl<M: Clone> BestModelTracker<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one evaluation. The model is cloned and retained when
    /// `val` strictly beats the best so far (the first observation
    /// always does). Returns whether it was retained.
    pub fn observe(&mut self, score: BestScore, model: &M) -> bool {
        let improved = match &self.best {
            Some((best, _)) => score.val > best.val,
            None => true,
        };
        if improved {
            self.best = Some((score, model.clone()));
        }
        improved
    }

    /// Hand over the retained model, or explain why there is none.
    pub fn into_best(
        self,
        schedule:   EvalSchedule,
        max_epochs: usize,
    ) -> Result<(BestScore, M), TrainError> {
        self.best.ok_or(TrainError::NoBestModel {
            max_epochs,
            warmup_epochs: schedule.warmup_epochs,
            eval_every:    schedule.eval_every,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cadence_matches_every_fifth_after_ten() {
        let s = EvalSchedule::new(10, 5);
        let evaluated: Vec<usize> = (1..=30).filter(|&e| s.should_evaluate(e)).collect();
        assert_eq!(evaluated, vec![15, 20, 25, 30]);
        assert_eq!(s.first_eval_epoch(), Some(15));
        assert!(s.evaluates_within(15));
        assert!(!s.evaluates_within(14));
    }

    #[test]
    fn test_zero_cadence_never_evaluates() {
        let s = EvalSchedule::new(0, 0);
        assert!(!s.should_evaluate(5));
        assert!(!s.evaluates_within(100));
    }

    #[test]
    fn test_keeps_best_not_last() {
        // the "model" is the epoch's weights snapshot
        let schedule = EvalSchedule::new(10, 5);
        let mut tracker = BestModelTracker::new();
        let history = [(15, 0.40), (20, 0.55), (25, 0.50), (30, 0.52)];
        let mut live = String::new();
        for (epoch, val) in history {
            live = format!("weights@{epoch}");
            tracker.observe(BestScore { epoch, val, test: Some(val - 0.1) }, &live);
        }
        assert_eq!(live, "weights@30");
        let (score, model) = tracker.into_best(schedule, 30).unwrap();
        assert_eq!(model, "weights@20");
        assert_eq!(score.epoch, 20);
    }

    #[test]
    fn test_equal_score_does_not_replace() {
        let mut tracker = BestModelTracker::new();
        assert!(tracker.observe(BestScore { epoch: 1, val: 0.5, test: None }, &1));
        assert!(!tracker.observe(BestScore { epoch: 2, val: 0.5, test: None }, &2));
        let (score, model) = tracker.into_best(EvalSchedule::new(0, 1), 2).unwrap();
        assert_eq!((score.epoch, model), (1, 1));
    }

    #[test]
    fn test_no_evaluation_is_an_error() {
        let tracker: BestModelTracker<u8> = BestModelTracker::new();
        let err = tracker.into_best(EvalSchedule::new(10, 5), 8).unwrap_err();
        assert_eq!(
            err,
            TrainError::NoBestModel { max_epochs: 8, warmup_epochs: 10, eval_every: 5 }
        );
    }
}
