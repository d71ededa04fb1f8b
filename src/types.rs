//! Core types shared by the feature, training and inference stages

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EmotionError, Result};

/// Mono audio signal at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Audio samples, normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz (e.g., 22050)
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if samples.is_empty() {
            return Err(EmotionError::InvalidWaveform(
                "waveform has no samples".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(EmotionError::InvalidWaveform(
                "sample rate must be positive".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// The eight emotion categories of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Neutral,
    Calm,
    Happy,
    Sad,
    Angry,
    Fearful,
    Disgust,
    Surprised,
}

impl Emotion {
    /// All labels in corpus code order (`01` through `08`).
    pub const ALL: [Emotion; 8] = [
        Emotion::Neutral,
        Emotion::Calm,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Fearful,
        Emotion::Disgust,
        Emotion::Surprised,
    ];

    /// Map a two-digit corpus code to its label.
    pub fn from_code(code: &str) -> Result<Self> {
        match code {
            "01" => Ok(Emotion::Neutral),
            "02" => Ok(Emotion::Calm),
            "03" => Ok(Emotion::Happy),
            "04" => Ok(Emotion::Sad),
            "05" => Ok(Emotion::Angry),
            "06" => Ok(Emotion::Fearful),
            "07" => Ok(Emotion::Disgust),
            "08" => Ok(Emotion::Surprised),
            other => Err(EmotionError::UnknownLabelCode(other.to_string())),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Emotion::Neutral => "01",
            Emotion::Calm => "02",
            Emotion::Happy => "03",
            Emotion::Sad => "04",
            Emotion::Angry => "05",
            Emotion::Fearful => "06",
            Emotion::Disgust => "07",
            Emotion::Surprised => "08",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Calm => "calm",
            Emotion::Happy => "happy",
            Emotion::Sad => "sad",
            Emotion::Angry => "angry",
            Emotion::Fearful => "fearful",
            Emotion::Disgust => "disgust",
            Emotion::Surprised => "surprised",
        }
    }
}

impl Display for Emotion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = EmotionError;

    fn from_str(raw: &str) -> Result<Self> {
        Emotion::ALL
            .iter()
            .copied()
            .find(|emotion| emotion.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| EmotionError::UnknownLabelCode(raw.to_string()))
    }
}
