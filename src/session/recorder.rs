use std::sync::mpsc::Receiver;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::info;

use crate::audio::capture::{record_audio, CaptureConfig};
use crate::types::Waveform;

/// Source of fixed-length recordings for the session worker.
pub trait Recorder {
    fn record(&mut self, duration: Duration) -> Result<Waveform>;
}

/// Microphone recorder backed by the default (or named) cpal input device.
pub struct LiveRecorder {
    config: CaptureConfig,
}

impl LiveRecorder {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }
}

impl Recorder for LiveRecorder {
    fn record(&mut self, duration: Duration) -> Result<Waveform> {
        let mut config = self.config.clone();
        config.duration = duration;
        info!(
            device = ?config.device_name,
            seconds = duration.as_secs_f32(),
            "starting live recording"
        );
        record_audio(&config)
    }
}

/// Replays a canned waveform. A gated recorder blocks until the gate fires so
/// tests can observe a recording in flight.
pub struct MockRecorder {
    waveform: Option<Waveform>,
    gate: Option<Receiver<()>>,
}

impl MockRecorder {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform: Some(waveform),
            gate: None,
        }
    }

    /// A recorder whose every call fails, for exercising error delivery.
    pub fn failing() -> Self {
        Self {
            waveform: None,
            gate: None,
        }
    }

    pub fn gated(mut self, gate: Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl Recorder for MockRecorder {
    fn record(&mut self, _duration: Duration) -> Result<Waveform> {
        if let Some(gate) = &self.gate {
            gate.recv()
                .map_err(|_| anyhow!("mock recorder gate closed"))?;
        }
        self.waveform
            .clone()
            .ok_or_else(|| anyhow!("mock recorder has no input device"))
    }
}
