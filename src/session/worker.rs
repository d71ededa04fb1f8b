use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use super::recorder::Recorder;
use crate::audio::encoder::encode_wav;
use crate::error::{EmotionError, Result};
use crate::predictor::Predictor;
use crate::types::Emotion;

pub const DEFAULT_RECORDING_SECONDS: u64 = 5;
pub const DEFAULT_RECORDING_FILE: &str = "real_time_audio.wav";

#[derive(Debug, Clone)]
pub struct RecordingOptions {
    pub duration: Duration,
    pub recording_path: PathBuf,
}

impl Default for RecordingOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(DEFAULT_RECORDING_SECONDS),
            recording_path: PathBuf::from(DEFAULT_RECORDING_FILE),
        }
    }
}

/// Runs record → save → predict on a background thread, one job at a time.
pub struct RecordingSession<R> {
    predictor: Arc<Predictor>,
    recorder: Arc<Mutex<R>>,
    options: RecordingOptions,
    in_flight: Arc<AtomicBool>,
}

impl<R: Recorder + Send + 'static> RecordingSession<R> {
    pub fn new(predictor: Arc<Predictor>, recorder: R, options: RecordingOptions) -> Self {
        Self {
            predictor,
            recorder: Arc::new(Mutex::new(recorder)),
            options,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn options(&self) -> &RecordingOptions {
        &self.options
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Launch a recording. Fails with [`EmotionError::Busy`] while a previous
    /// one has not yet delivered its result.
    pub fn start(&self) -> Result<PendingPrediction> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(EmotionError::Busy);
        }
        let guard = InFlight(Arc::clone(&self.in_flight));

        let predictor = Arc::clone(&self.predictor);
        let recorder = Arc::clone(&self.recorder);
        let options = self.options.clone();
        let (tx, rx) = channel();
        info!(
            seconds = options.duration.as_secs_f32(),
            path = %options.recording_path.display(),
            "starting recording worker"
        );
        let join = thread::Builder::new()
            .name("recording-worker".to_string())
            .spawn(move || {
                let outcome = record_and_predict(&predictor, &recorder, &options);
                match &outcome {
                    Ok(label) => info!(%label, "recording classified"),
                    Err(err) => error!(error = %err, "recording worker failed"),
                }
                drop(guard);
                if tx.send(outcome).is_err() {
                    debug!("prediction handle dropped before the result arrived");
                }
            })?;

        Ok(PendingPrediction {
            rx,
            join: Some(join),
        })
    }
}

fn record_and_predict<R: Recorder>(
    predictor: &Predictor,
    recorder: &Mutex<R>,
    options: &RecordingOptions,
) -> Result<Emotion> {
    let waveform = {
        let mut recorder = recorder
            .lock()
            .map_err(|_| EmotionError::Capture("recorder lock poisoned".to_string()))?;
        recorder
            .record(options.duration)
            .map_err(|err| EmotionError::Capture(format!("{:#}", err)))?
    };
    encode_wav(&waveform, &options.recording_path).map_err(|err| {
        EmotionError::Capture(format!(
            "failed to save recording to {:?}: {:#}",
            options.recording_path, err
        ))
    })?;
    predictor.predict_file(&options.recording_path)
}

// Clears the busy flag even if the worker panics.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to the single result of one recording.
pub struct PendingPrediction {
    rx: Receiver<Result<Emotion>>,
    join: Option<JoinHandle<()>>,
}

impl PendingPrediction {
    /// `None` while the worker is still running.
    pub fn try_result(&mut self) -> Option<Result<Emotion>> {
        match self.rx.try_recv() {
            Ok(outcome) => {
                self.reap();
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.reap();
                Some(Err(worker_vanished()))
            }
        }
    }

    pub fn wait(mut self) -> Result<Emotion> {
        let outcome = self.rx.recv().unwrap_or_else(|_| Err(worker_vanished()));
        self.reap();
        outcome
    }

    fn reap(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                error!("recording worker panicked");
            }
        }
    }
}

fn worker_vanished() -> EmotionError {
    EmotionError::Capture("recording worker exited without a result".to_string())
}
