//! Labeled corpus discovery and loading.
//!
//! The corpus is a root directory of per-speaker folders (`Actor_01`, ...)
//! holding WAV files whose dash-separated names carry the emotion code in the
//! third field, e.g. `03-01-05-01-02-01-12.wav` is `angry`. Loading stops at
//! the first file that cannot be labeled or decoded so that a broken corpus
//! never trains on a silently reduced set.

mod split;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{EmotionError, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::types::Emotion;

pub use split::{shuffled_indices, DatasetSplit, Partition, DEFAULT_SPLIT_SEED, DEFAULT_TEST_RATIO};

const LABEL_FIELD: usize = 2;

#[derive(Debug, Clone)]
pub struct CorpusLayout {
    pub root: PathBuf,
    pub speaker_prefix: String,
    pub extension: String,
}

impl CorpusLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            speaker_prefix: "Actor_".to_string(),
            extension: "wav".to_string(),
        }
    }

    pub fn with_speaker_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.speaker_prefix = prefix.into();
        self
    }
}

/// List corpus audio files in path order.
pub fn discover(layout: &CorpusLayout) -> Result<Vec<PathBuf>> {
    if !layout.root.is_dir() {
        return Err(EmotionError::InvalidConfig(format!(
            "corpus root {:?} is not a directory",
            layout.root
        )));
    }

    let mut files = Vec::new();
    for speaker in fs::read_dir(&layout.root)? {
        let speaker = speaker?.path();
        let is_speaker_dir = speaker.is_dir()
            && speaker
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(&layout.speaker_prefix))
                .unwrap_or(false);
        if !is_speaker_dir {
            continue;
        }
        for entry in fs::read_dir(&speaker)? {
            let path = entry?.path();
            if path.is_file() && has_extension(&path, &layout.extension) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Emotion encoded in the third dash-separated field of a corpus file name.
pub fn label_from_file_name(path: &Path) -> Result<Emotion> {
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| EmotionError::MalformedFileName(path.to_path_buf()))?;
    let code = stem
        .split('-')
        .nth(LABEL_FIELD)
        .ok_or_else(|| EmotionError::MalformedFileName(path.to_path_buf()))?;
    Emotion::from_code(code)
}

#[derive(Debug, Clone)]
pub struct LabeledSample {
    pub path: PathBuf,
    pub features: FeatureVector,
    pub label: Emotion,
}

/// Feature vectors of a whole corpus paired with their labels.
#[derive(Debug, Clone)]
pub struct Dataset {
    samples: Vec<LabeledSample>,
    dimension: usize,
}

impl Dataset {
    pub fn load(layout: &CorpusLayout, extractor: &FeatureExtractor) -> Result<Self> {
        let files = discover(layout)?;
        info!(
            root = %layout.root.display(),
            files = files.len(),
            "discovered corpus files"
        );
        let mut samples = Vec::with_capacity(files.len());
        for path in files {
            let label = label_from_file_name(&path)?;
            let features = extractor.extract_file(&path)?;
            debug!(path = %path.display(), label = %label, "extracted features");
            samples.push(LabeledSample {
                path,
                features,
                label,
            });
        }
        if samples.is_empty() {
            return Err(EmotionError::EmptyCorpus(layout.root.clone()));
        }
        Self::from_samples(samples)
    }

    /// Build a dataset from already extracted samples; all vectors must share
    /// one length.
    pub fn from_samples(mut samples: Vec<LabeledSample>) -> Result<Self> {
        let dimension = samples
            .first()
            .map(|sample| sample.features.len())
            .ok_or_else(|| EmotionError::EmptyCorpus(PathBuf::new()))?;
        for sample in &samples {
            EmotionError::check_dimension(dimension, sample.features.len())?;
        }
        samples.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self { samples, dimension })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    /// Seeded shuffle split; the same corpus, ratio and seed always produce
    /// the same partitions.
    pub fn split(&self, test_ratio: f64, seed: u64) -> Result<DatasetSplit> {
        let (test_idx, train_idx) = shuffled_indices(self.samples.len(), test_ratio, seed)?;
        let split = DatasetSplit {
            train: Partition::gather(&self.samples, &train_idx, self.dimension),
            test: Partition::gather(&self.samples, &test_idx, self.dimension),
        };
        info!(
            train = split.train.len(),
            test = split.test.len(),
            test_ratio,
            seed,
            "split dataset"
        );
        Ok(split)
    }
}
