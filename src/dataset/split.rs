use std::collections::BTreeMap;
use std::path::PathBuf;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::LabeledSample;
use crate::error::{EmotionError, Result};
use crate::types::Emotion;

pub const DEFAULT_TEST_RATIO: f64 = 0.2;
pub const DEFAULT_SPLIT_SEED: u64 = 9;

/// One side of a train/test split, rows aligned across the three fields.
#[derive(Debug, Clone)]
pub struct Partition {
    pub files: Vec<PathBuf>,
    pub features: Array2<f32>,
    pub labels: Vec<Emotion>,
}

impl Partition {
    pub(super) fn gather(samples: &[LabeledSample], indices: &[usize], dimension: usize) -> Self {
        let features = Array2::from_shape_fn((indices.len(), dimension), |(row, col)| {
            samples[indices[row]].features.as_array()[col]
        });
        Self {
            files: indices.iter().map(|&i| samples[i].path.clone()).collect(),
            features,
            labels: indices.iter().map(|&i| samples[i].label).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn class_counts(&self) -> BTreeMap<Emotion, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: Partition,
    pub test: Partition,
}

/// Shuffle `0..n` with a seeded generator and return `(test, train)` index
/// sets, the test side holding `ceil(ratio * n)` entries.
pub fn shuffled_indices(n: usize, test_ratio: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(EmotionError::InvalidConfig(format!(
            "test ratio must lie strictly between 0 and 1, got {}",
            test_ratio
        )));
    }
    let n_test = (test_ratio * n as f64).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(EmotionError::InvalidConfig(format!(
            "cannot split {} samples with test ratio {}: both partitions must be non-empty",
            n, test_ratio
        )));
    }
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let train = indices.split_off(n_test);
    Ok((indices, train))
}
