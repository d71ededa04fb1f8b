use std::path::Path;

use ndarray::Axis;
use tracing::debug;

use crate::config::ArtifactPaths;
use crate::error::{EmotionError, Result};
use crate::features::{FeatureConfig, FeatureExtractor};
use crate::model::{persistence, MlpClassifier, StandardScaler};
use crate::types::{Emotion, Waveform};

/// Fitted extractor, scaler and classifier bundled for inference. Immutable,
/// so one instance can be shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Predictor {
    extractor: FeatureExtractor,
    scaler: StandardScaler,
    model: MlpClassifier,
}

impl Predictor {
    pub fn new(
        extractor: FeatureExtractor,
        scaler: StandardScaler,
        model: MlpClassifier,
    ) -> Result<Self> {
        if let Some(trained) = scaler.features() {
            if trained != extractor.config() {
                return Err(EmotionError::InvalidConfig(format!(
                    "artifacts were trained with {:?}, extractor uses {:?}",
                    trained,
                    extractor.config()
                )));
            }
        }
        EmotionError::check_dimension(scaler.dimension(), extractor.dimension())?;
        EmotionError::check_dimension(model.input_dim(), scaler.dimension())?;
        Ok(Self {
            extractor,
            scaler,
            model,
        })
    }

    /// Read the scaler and model blobs written by training. The extractor is
    /// rebuilt from the feature configuration stored with the scaler.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let scaler_path = paths.scaler_path();
        let scaler: StandardScaler = persistence::load(&scaler_path)?;
        let features = scaler
            .features()
            .copied()
            .ok_or_else(|| EmotionError::ArtifactLoad {
                path: scaler_path,
                reason: "scaler does not record its feature configuration".to_string(),
            })?;
        let model: MlpClassifier = persistence::load(&paths.model_path())?;
        Self::new(FeatureExtractor::new(features)?, scaler, model)
    }

    pub fn features(&self) -> &FeatureConfig {
        self.extractor.config()
    }

    pub fn classes(&self) -> &[Emotion] {
        self.model.classes()
    }

    pub fn predict(&self, waveform: &Waveform) -> Result<Emotion> {
        let features = self.extractor.extract(waveform)?;
        let scaled = self.scaler.transform_vector(&features)?;
        let label = self.model.predict_one(&scaled)?;
        debug!(%label, seconds = waveform.duration_secs(), "predicted emotion");
        Ok(label)
    }

    pub fn predict_file(&self, path: &Path) -> Result<Emotion> {
        let features = self.extractor.extract_file(path)?;
        let scaled = self.scaler.transform_vector(&features)?;
        self.model.predict_one(&scaled)
    }

    /// Class probabilities for one waveform, highest first.
    pub fn predict_distribution(&self, waveform: &Waveform) -> Result<Vec<(Emotion, f32)>> {
        let features = self.extractor.extract(waveform)?;
        let scaled = self.scaler.transform_vector(&features)?;
        let proba = self.model.predict_proba(&scaled.insert_axis(Axis(0)))?;
        let mut distribution: Vec<(Emotion, f32)> = self
            .model
            .classes()
            .iter()
            .copied()
            .zip(proba.row(0).iter().copied())
            .collect();
        distribution.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(distribution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HyperParams, LearningRate, TrainerSettings};
    use ndarray::Array2;

    fn tiny_model(inputs: usize) -> MlpClassifier {
        let x = Array2::from_shape_fn((4, inputs), |(row, col)| (row * 3 + col) as f32 % 5.0);
        let y = [Emotion::Calm, Emotion::Sad, Emotion::Calm, Emotion::Sad];
        let params = HyperParams {
            hidden_layers: vec![4],
            alpha: 1e-4,
            learning_rate: LearningRate::Constant,
        };
        let settings = TrainerSettings {
            max_iter: 5,
            ..TrainerSettings::default()
        };
        MlpClassifier::fit(&x, &y, &[Emotion::Calm, Emotion::Sad], &params, &settings).unwrap()
    }

    #[test]
    fn rejects_mismatched_components() {
        let extractor = FeatureExtractor::default();
        let scaler = StandardScaler::fit(&Array2::from_shape_fn((3, 5), |(r, c)| (r + c) as f32))
            .unwrap();
        let err = Predictor::new(extractor, scaler, tiny_model(5)).unwrap_err();
        assert!(matches!(
            err,
            EmotionError::DimensionMismatch {
                expected: 5,
                actual: 202
            }
        ));
    }

    #[test]
    fn rejects_same_width_from_another_config() {
        let trained = FeatureConfig::default();
        let drifted = FeatureConfig {
            chroma: false,
            n_mfcc: 36,
            ..FeatureConfig::default()
        };
        assert_eq!(trained.dimension(), drifted.dimension());

        let width = trained.dimension();
        let scaler =
            StandardScaler::fit(&Array2::from_shape_fn((3, width), |(r, c)| (r * c) as f32))
                .unwrap()
                .with_features(trained)
                .unwrap();
        let model = tiny_model(width);
        let err = Predictor::new(
            FeatureExtractor::new(drifted).unwrap(),
            scaler.clone(),
            model.clone(),
        )
        .unwrap_err();
        assert!(matches!(err, EmotionError::InvalidConfig(_)));

        let predictor = Predictor::new(FeatureExtractor::new(trained).unwrap(), scaler, model);
        assert_eq!(predictor.unwrap().features(), &trained);
    }

    #[test]
    fn distribution_sums_to_one() {
        let config = FeatureConfig {
            mfcc: false,
            chroma: false,
            mel: false,
            n_mfcc: 1,
        };
        let extractor = FeatureExtractor::new(config).unwrap();
        let scaler = StandardScaler::fit(&ndarray::array![[0.1_f32, 0.0], [0.3, 0.5]]).unwrap();
        let predictor = Predictor::new(extractor, scaler, tiny_model(2)).unwrap();

        let samples: Vec<f32> = (0..4096).map(|i| ((i as f32) * 0.05).sin() * 0.5).collect();
        let waveform = Waveform::new(samples, 22_050).unwrap();
        let distribution = predictor.predict_distribution(&waveform).unwrap();
        assert_eq!(distribution.len(), 2);
        let total: f32 = distribution.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-4);
        assert!(distribution[0].1 >= distribution[1].1);
        let label = predictor.predict(&waveform).unwrap();
        assert_eq!(label, distribution[0].0);
    }
}
