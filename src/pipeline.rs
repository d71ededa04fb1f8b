//! Staged training: corpus → split → scaler → grid search → artifacts.
//!
//! Each stage is callable on its own so that callers (and tests) can stop
//! after any of them; [`TrainingPipeline::run`] chains all five.

use std::collections::BTreeMap;
use std::fs;

use ndarray::Array2;
use serde::Serialize;
use tracing::info;

use crate::config::ArtifactPaths;
use crate::dataset::{CorpusLayout, Dataset, DatasetSplit, DEFAULT_SPLIT_SEED, DEFAULT_TEST_RATIO};
use crate::error::{EmotionError, Result};
use crate::features::{FeatureConfig, FeatureExtractor};
use crate::model::{
    persistence, CandidateScore, GridSearch, HyperParams, MlpClassifier, StandardScaler,
};
use crate::types::Emotion;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SplitSettings {
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            test_ratio: DEFAULT_TEST_RATIO,
            seed: DEFAULT_SPLIT_SEED,
        }
    }
}

/// Train and test matrices after standardization with the train-fitted scaler.
#[derive(Debug, Clone)]
pub struct ScaledSplit {
    pub scaler: StandardScaler,
    pub train_x: Array2<f32>,
    pub train_y: Vec<Emotion>,
    pub test_x: Array2<f32>,
    pub test_y: Vec<Emotion>,
}

#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: MlpClassifier,
    pub best_params: HyperParams,
    pub cv_accuracy: f32,
    pub test_accuracy: f32,
    pub candidates: Vec<CandidateScore>,
}

/// Summary written next to the model as `training_report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub train_size: usize,
    pub test_size: usize,
    pub feature_dim: usize,
    pub features: FeatureConfig,
    pub split: SplitSettings,
    pub class_counts: BTreeMap<Emotion, usize>,
    pub test_class_counts: BTreeMap<Emotion, usize>,
    pub best_params: HyperParams,
    pub cv_accuracy: f32,
    pub test_accuracy: f32,
    pub epochs: usize,
    pub candidates: Vec<CandidateScore>,
}

#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    pub layout: CorpusLayout,
    pub features: FeatureConfig,
    pub split: SplitSettings,
    pub search: GridSearch,
}

impl TrainingPipeline {
    pub fn new(layout: CorpusLayout) -> Self {
        Self {
            layout,
            features: FeatureConfig::default(),
            split: SplitSettings::default(),
            search: GridSearch::default(),
        }
    }

    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self
    }

    pub fn with_split(mut self, split: SplitSettings) -> Self {
        self.split = split;
        self
    }

    pub fn with_search(mut self, search: GridSearch) -> Self {
        self.search = search;
        self
    }

    pub fn load_dataset(&self) -> Result<Dataset> {
        let extractor = FeatureExtractor::new(self.features)?;
        Dataset::load(&self.layout, &extractor)
    }

    pub fn split(&self, dataset: &Dataset) -> Result<DatasetSplit> {
        dataset.split(self.split.test_ratio, self.split.seed)
    }

    pub fn fit_scaler(&self, split: &DatasetSplit) -> Result<ScaledSplit> {
        let scaler = StandardScaler::fit(&split.train.features)?.with_features(self.features)?;
        let train_x = scaler.transform(&split.train.features)?;
        let test_x = scaler.transform(&split.test.features)?;
        info!(dimension = scaler.dimension(), "fitted feature scaler");
        Ok(ScaledSplit {
            scaler,
            train_x,
            train_y: split.train.labels.clone(),
            test_x,
            test_y: split.test.labels.clone(),
        })
    }

    pub fn train(&self, scaled: &ScaledSplit) -> Result<TrainedModel> {
        info!(
            candidates = self.search.grid().len(),
            folds = self.search.folds(),
            "starting grid search"
        );
        let result = self.search.fit(&scaled.train_x, &scaled.train_y)?;
        let test_accuracy = result.model.score(&scaled.test_x, &scaled.test_y)?;
        info!(
            best_params = %result.best_params,
            cv_accuracy = result.best_score,
            test_accuracy,
            "grid search finished"
        );
        Ok(TrainedModel {
            model: result.model,
            best_params: result.best_params,
            cv_accuracy: result.best_score,
            test_accuracy,
            candidates: result.candidates,
        })
    }

    pub fn write_artifacts(
        &self,
        paths: &ArtifactPaths,
        scaler: &StandardScaler,
        trained: &TrainedModel,
        report: &TrainingReport,
    ) -> Result<()> {
        paths.ensure_dir()?;
        persistence::save(scaler, &paths.scaler_path())?;
        persistence::save(&trained.model, &paths.model_path())?;

        let report_path = paths.report_path();
        let write_err = |reason: String| EmotionError::ArtifactWrite {
            path: report_path.clone(),
            reason,
        };
        let json =
            serde_json::to_string_pretty(report).map_err(|err| write_err(err.to_string()))?;
        fs::write(&report_path, json).map_err(|err| write_err(err.to_string()))?;
        info!(path = %report_path.display(), "wrote training report");
        Ok(())
    }

    pub fn run(&self, paths: &ArtifactPaths) -> Result<TrainingReport> {
        let dataset = self.load_dataset()?;
        let split = self.split(&dataset)?;
        let scaled = self.fit_scaler(&split)?;
        let trained = self.train(&scaled)?;
        let report = TrainingReport {
            train_size: split.train.len(),
            test_size: split.test.len(),
            feature_dim: dataset.dimension(),
            features: self.features,
            split: self.split,
            class_counts: split.train.class_counts(),
            test_class_counts: split.test.class_counts(),
            best_params: trained.best_params.clone(),
            cv_accuracy: trained.cv_accuracy,
            test_accuracy: trained.test_accuracy,
            epochs: trained.model.epochs(),
            candidates: trained.candidates.clone(),
        };
        self.write_artifacts(paths, &scaled.scaler, &trained, &report)?;
        Ok(report)
    }
}
