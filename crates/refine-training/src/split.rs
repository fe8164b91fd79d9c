//! Train/validation split by episode.
//!
//! Whole episodes go to one side of the boundary so correlated inferences never
//! leak between the two sets.

use crate::error::{TrainingError, TrainingResult};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashSet;

pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplit<T> {
    pub train: Vec<T>,
    pub validation: Vec<T>,
    pub train_keys: Vec<String>,
    pub validation_keys: Vec<String>,
}

impl<T> DatasetSplit<T> {
    /// Share of records (not keys) that ended up in validation.
    #[must_use]
    pub fn realized_validation_fraction(&self) -> f64 {
        let total = self.train.len() + self.validation.len();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let fraction = self.validation.len() as f64 / total as f64;
        fraction
    }
}

/// Number of keys that go to training for `total` keys.
#[must_use]
pub fn train_key_count(total: usize, val_fraction: f64) -> usize {
    #[allow(clippy::cast_precision_loss)]
    let exact = total as f64 * (1.0 - val_fraction);
    (exact.round() as usize).min(total)
}

pub fn validate_fraction(val_fraction: f64) -> TrainingResult<()> {
    if !val_fraction.is_finite() || !(0.0..1.0).contains(&val_fraction) {
        return Err(TrainingError::InvalidConfig(format!(
            "validation fraction must be in [0, 1), got {val_fraction}"
        )));
    }
    Ok(())
}

/// Split `items` by the key `key_of` returns.
///
/// Distinct keys are collected in first-seen order, shuffled with a generator
/// seeded by `seed`, and the first `round(n * (1 - val_fraction))` keys become
/// the training set.
pub fn split_by_key<T, F>(items: Vec<T>, key_of: F, val_fraction: f64, seed: u64) -> TrainingResult<DatasetSplit<T>>
where
    F: Fn(&T) -> &str,
{
    validate_fraction(val_fraction)?;

    let mut seen = HashSet::new();
    let mut keys: Vec<String> = Vec::new();
    for item in &items {
        let key = key_of(item);
        if seen.insert(key.to_string()) {
            keys.push(key.to_string());
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    keys.shuffle(&mut rng);

    let cut = train_key_count(keys.len(), val_fraction);
    let validation_keys = keys.split_off(cut);
    let train_keys = keys;

    let train_set: HashSet<&str> = train_keys.iter().map(String::as_str).collect();
    let (train, validation): (Vec<T>, Vec<T>) = items.into_iter().partition(|item| train_set.contains(key_of(item)));

    Ok(DatasetSplit { train, validation, train_keys, validation_keys })
}
