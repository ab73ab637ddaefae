// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Carves a validation set out of the training examples when a
// dataset ships without one.
//
// The shuffle is driven by a StdRng seeded from env_args.seed,
// so the same seed always yields the same split.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, validation).
///
/// `val_fraction` is the share of samples moved to validation,
/// e.g. 0.1 = 10%.
pub fn split_train_val<T>(mut samples: Vec<T>, val_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total  = samples.len();
    let n_val  = ((total as f64) * val_fraction.clamp(0.0, 1.0)).round() as usize;
    let val    = samples.split_off(total - n_val.min(total));

    tracing::debug!(
        "Dataset split: {} training, {} validation (seed {})",
        samples.len(),
        val.len(),
        seed,
    );

    (samples, val)
}
