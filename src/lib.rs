pub mod audio;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod predictor;
pub mod session;
pub mod types;

pub use error::{EmotionError, Result};
pub use predictor::Predictor;
pub use types::{Emotion, Waveform};
