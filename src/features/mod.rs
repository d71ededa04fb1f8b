mod chroma;
mod spectral;
mod statistics;
mod temporal;

use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::decoder::decode_audio;
use crate::error::{EmotionError, Result};
use crate::types::Waveform;

use chroma::{chromagram, CHROMA_BINS};
use spectral::{compute_spectrograms, MEL_BANDS};
use statistics::{compute_delta_matrix, frame_mean, mfcc_matrix, DELTA_WINDOW};

pub const DEFAULT_MFCC_COUNT: usize = 30;
/// RMS energy and zero-crossing rate are always appended.
const TEMPORAL_DIMS: usize = 2;

/// Which feature groups to compute and how many cepstral coefficients to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub mfcc: bool,
    pub chroma: bool,
    pub mel: bool,
    pub n_mfcc: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            mfcc: true,
            chroma: true,
            mel: true,
            n_mfcc: DEFAULT_MFCC_COUNT,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mfcc && !(1..=MEL_BANDS).contains(&self.n_mfcc) {
            return Err(EmotionError::InvalidConfig(format!(
                "n_mfcc must be between 1 and {}, got {}",
                MEL_BANDS, self.n_mfcc
            )));
        }
        Ok(())
    }

    /// Length of every vector produced under this configuration.
    pub fn dimension(&self) -> usize {
        let mut dims = TEMPORAL_DIMS;
        if self.mfcc {
            dims += 2 * self.n_mfcc;
        }
        if self.chroma {
            dims += CHROMA_BINS;
        }
        if self.mel {
            dims += MEL_BANDS;
        }
        dims
    }
}

/// Fixed-length acoustic summary of one waveform.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Array1<f32>);

impl FeatureVector {
    pub fn new(values: Array1<f32>) -> Self {
        Self(values)
    }

    pub fn as_array(&self) -> &Array1<f32> {
        &self.0
    }

    pub fn into_array(self) -> Array1<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn zero_crossing_rate(&self) -> Option<f32> {
        self.0.last().copied()
    }

    pub fn rms_energy(&self) -> Option<f32> {
        self.0.len().checked_sub(2).map(|idx| self.0[idx])
    }
}

/// Turns waveforms into feature vectors: MFCC means and deltas, chroma,
/// log-mel bands, RMS energy, zero-crossing rate, in that order.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn dimension(&self) -> usize {
        self.config.dimension()
    }

    pub fn extract_file(&self, path: &Path) -> Result<FeatureVector> {
        let waveform = decode_audio(path).map_err(|err| EmotionError::decode(path, err))?;
        debug!(
            path = %path.display(),
            sample_rate = waveform.sample_rate,
            samples = waveform.samples.len(),
            "decoded audio"
        );
        self.extract(&waveform)
    }

    pub fn extract(&self, waveform: &Waveform) -> Result<FeatureVector> {
        if waveform.samples.is_empty() || waveform.sample_rate == 0 {
            return Err(EmotionError::InvalidWaveform(
                "cannot extract features from an empty waveform".to_string(),
            ));
        }

        let mut values = Vec::with_capacity(self.dimension());
        if self.config.mfcc || self.config.chroma || self.config.mel {
            let spectra = compute_spectrograms(waveform);
            if self.config.mfcc {
                let coefficients = mfcc_matrix(&spectra.mel_db, self.config.n_mfcc);
                let deltas = compute_delta_matrix(&coefficients, DELTA_WINDOW);
                values.extend(frame_mean(&coefficients).iter().copied());
                values.extend(frame_mean(&deltas).iter().copied());
            }
            if self.config.chroma {
                let chroma = chromagram(&spectra.power, &spectra.freqs);
                values.extend(frame_mean(&chroma).iter().copied());
            }
            if self.config.mel {
                values.extend(frame_mean(&spectra.mel_db).iter().copied());
            }
        }
        values.push(temporal::rms_mean(&waveform.samples));
        values.push(temporal::zero_crossing_mean(&waveform.samples));

        EmotionError::check_dimension(self.dimension(), values.len())?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EmotionError::InvalidWaveform(
                "waveform produced non-finite features".to_string(),
            ));
        }
        Ok(FeatureVector(Array1::from(values)))
    }
}
