use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EmotionError, Result};
use crate::features::{FeatureConfig, FeatureVector};

/// Per-dimension standardization fitted once on the training matrix.
/// Remembers the feature configuration that produced the matrix when known,
/// so inference can rebuild the same extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f32>,
    scale: Array1<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    features: Option<FeatureConfig>,
}

impl StandardScaler {
    /// Column means and population standard deviations of `matrix`.
    /// Constant columns keep a unit scale so they map to zero.
    pub fn fit(matrix: &Array2<f32>) -> Result<Self> {
        let rows = matrix.len_of(Axis(0));
        if rows == 0 || matrix.len_of(Axis(1)) == 0 {
            return Err(EmotionError::Training(
                "cannot fit a scaler on an empty matrix".to_string(),
            ));
        }
        let mut degenerate = 0usize;
        let (mean, scale): (Vec<f32>, Vec<f32>) = matrix
            .axis_iter(Axis(1))
            .map(|column| {
                let (mean, std) = column_moments(column);
                if std > f64::EPSILON {
                    (mean as f32, std as f32)
                } else {
                    degenerate += 1;
                    (mean as f32, 1.0)
                }
            })
            .unzip();
        if degenerate > 0 {
            warn!(columns = degenerate, "scaler found columns without variance");
        }
        Ok(Self {
            mean: Array1::from(mean),
            scale: Array1::from(scale),
            features: None,
        })
    }

    /// Tag the scaler with the configuration its training rows came from.
    pub fn with_features(mut self, features: FeatureConfig) -> Result<Self> {
        EmotionError::check_dimension(self.dimension(), features.dimension())?;
        self.features = Some(features);
        Ok(self)
    }

    pub fn features(&self) -> Option<&FeatureConfig> {
        self.features.as_ref()
    }

    /// Shape and value checks for a scaler read back from disk.
    pub fn validate(&self) -> Result<()> {
        if self.mean.is_empty() {
            return Err(EmotionError::InvalidConfig(
                "scaler has no dimensions".to_string(),
            ));
        }
        EmotionError::check_dimension(self.mean.len(), self.scale.len())?;
        if let Some(idx) = self.mean.iter().position(|m| !m.is_finite()) {
            return Err(EmotionError::InvalidConfig(format!(
                "scaler mean {} is not finite",
                idx
            )));
        }
        if let Some(idx) = self.scale.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(EmotionError::InvalidConfig(format!(
                "scaler scale {} must be finite and positive",
                idx
            )));
        }
        if let Some(features) = &self.features {
            features.validate()?;
            EmotionError::check_dimension(self.dimension(), features.dimension())?;
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f32> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f32> {
        &self.scale
    }

    pub fn transform(&self, matrix: &Array2<f32>) -> Result<Array2<f32>> {
        EmotionError::check_dimension(self.dimension(), matrix.len_of(Axis(1)))?;
        Ok((matrix - &self.mean) / &self.scale)
    }

    pub fn transform_vector(&self, vector: &FeatureVector) -> Result<Array1<f32>> {
        EmotionError::check_dimension(self.dimension(), vector.len())?;
        Ok((vector.as_array() - &self.mean) / &self.scale)
    }
}

fn column_moments(column: ArrayView1<f32>) -> (f64, f64) {
    let n = column.len() as f64;
    let mean = column.iter().map(|&v| v as f64).sum::<f64>() / n;
    let variance = column
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn standardizes_each_column() {
        let matrix = array![[1.0_f32, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let scaler = StandardScaler::fit(&matrix).unwrap();
        let scaled = scaler.transform(&matrix).unwrap();
        for column in scaled.axis_iter(Axis(1)) {
            let mean = column.mean().unwrap();
            let std = column.mapv(|v| (v - mean).powi(2)).mean().unwrap().sqrt();
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-5);
            assert_abs_diff_eq!(std, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn constant_column_maps_to_zero() {
        let matrix = array![[5.0_f32, 1.0], [5.0, 3.0]];
        let scaler = StandardScaler::fit(&matrix).unwrap();
        assert_eq!(scaler.scale()[0], 1.0);
        let scaled = scaler.transform(&matrix).unwrap();
        assert!(scaled.column(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn refuses_other_widths() {
        let scaler = StandardScaler::fit(&array![[1.0_f32, 2.0], [3.0, 4.0]]).unwrap();
        let err = scaler.transform(&array![[1.0_f32, 2.0, 3.0]]).unwrap_err();
        assert!(matches!(
            err,
            EmotionError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));
        let vector = FeatureVector::new(array![1.0_f32]);
        assert!(scaler.transform_vector(&vector).is_err());
    }

    #[test]
    fn feature_tag_must_match_width() {
        let scaler = StandardScaler::fit(&array![[1.0_f32, 2.0], [3.0, 4.0]]).unwrap();
        assert!(scaler.features().is_none());
        let energy_only = FeatureConfig {
            mfcc: false,
            chroma: false,
            mel: false,
            n_mfcc: 1,
        };
        let tagged = scaler.clone().with_features(energy_only).unwrap();
        assert_eq!(tagged.features(), Some(&energy_only));
        assert!(scaler.with_features(FeatureConfig::default()).is_err());
    }

    #[test]
    fn validation_rejects_inconsistent_state() {
        let good = StandardScaler::fit(&array![[1.0_f32, 2.0], [3.0, 5.0]]).unwrap();
        good.validate().unwrap();

        let mut short = good.clone();
        short.scale = array![1.0_f32];
        assert!(short.validate().is_err());

        let mut zero = good.clone();
        zero.scale[1] = 0.0;
        assert!(zero.validate().is_err());

        let mut nan = good;
        nan.mean[0] = f32::NAN;
        assert!(nan.validate().is_err());
    }

    #[test]
    fn empty_matrix_cannot_be_fitted() {
        assert!(StandardScaler::fit(&Array2::<f32>::zeros((0, 4))).is_err());
    }
}
