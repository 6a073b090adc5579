// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Seeded shuffle, then a cut at round(n · train_fraction).
// The same seed always yields the same split.
//
// The validation loss drives the learning-rate scheduler, so
// a fraction strictly between 0 and 1 keeps at least one
// impression on each side whenever there are two or more.
// A fraction of exactly 0 or 1 (after clamping) is honoured.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `items` with `seed` and split into (train, validation).
pub fn split_train_val<T>(mut items: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    items.shuffle(&mut StdRng::seed_from_u64(seed));

    let n   = items.len();
    let cut = train_cut(n, train_fraction.clamp(0.0, 1.0));
    let validation = items.split_off(cut);

    tracing::debug!("Split {} impressions at {}: {} train / {} validation",
        n, cut, items.len(), validation.len());
    (items, validation)
}

fn train_cut(n: usize, fraction: f64) -> usize {
    let cut = ((n as f64) * fraction).round() as usize;
    if fraction <= 0.0 || fraction >= 1.0 || n < 2 {
        return cut.min(n);
    }
    cut.clamp(1, n - 1)
}
