//! Deterministic node partitioning into train/validation/test sets.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Disjoint, exhaustive row-index sets for train, validation and test.
///
/// Every row index appears in exactly one split. Within each split the
/// indices are kept in ascending row order, so iterating a split walks
/// the nodes in their original encoding order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSplit {
    /// Row indices used for loss computation and parameter updates
    pub train: Vec<usize>,
    /// Row indices used for per-epoch monitoring only
    pub val: Vec<usize>,
    /// Row indices held out for final evaluation
    pub test: Vec<usize>,
}

impl DataSplit {
    /// Partition `n` row indices by a seeded shuffle.
    ///
    /// The first `floor(train_ratio * n)` shuffled indices go to train;
    /// `round(val_ratio * n)` of the remainder (clipped to what is
    /// left, so the test set may come out empty) go to validation; the
    /// rest go to test. The same `n` and `seed` always produce the same
    /// partition.
    pub fn random(n: usize, train_ratio: f64, val_ratio: f64, seed: u64) -> Self {
        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_train = (train_ratio * n as f64).floor() as usize;
        let n_train = n_train.min(n);
        let n_val = ((val_ratio * n as f64).round() as usize).min(n - n_train);

        let mut train = indices[..n_train].to_vec();
        let mut val = indices[n_train..n_train + n_val].to_vec();
        let mut test = indices[n_train + n_val..].to_vec();
        train.sort_unstable();
        val.sort_unstable();
        test.sort_unstable();

        Self { train, val, test }
    }

    /// Get the total number of partitioned indices.
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// Check whether the partition is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
