use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tracing::{debug, error, info};

use crate::audio::resample;
use crate::types::Waveform;

/// Rate recordings are delivered and saved at.
pub const DEFAULT_CAPTURE_RATE: u32 = 22_050;
const CHANNEL_CAPACITY: usize = 64;
const POLL_INTERVAL: Duration = Duration::from_millis(50);
// Slack on top of the requested duration before the device is declared stalled.
const STALL_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct CaptureConfig {
    pub device_name: Option<String>,
    pub sample_rate: u32,
    pub duration: Duration,
}

impl CaptureConfig {
    pub fn new(duration: Duration) -> Self {
        Self {
            device_name: None,
            sample_rate: DEFAULT_CAPTURE_RATE,
            duration,
        }
    }

    pub fn with_device(mut self, device_name: Option<String>) -> Self {
        self.device_name = device_name;
        self
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }
}

struct StreamSetup {
    stream: Stream,
    receiver: Receiver<Vec<f32>>,
    finished: Arc<AtomicBool>,
    sample_rate: u32,
}

/// Record `config.duration` of mono audio from the input device, blocking
/// until enough frames have arrived.
pub fn record_audio(config: &CaptureConfig) -> Result<Waveform> {
    let device = select_device(config)?;
    let setup = build_stream(&device)?;
    let frames_needed = frames_for_duration(config.duration, setup.sample_rate);
    info!(
        device_rate = setup.sample_rate,
        target_rate = config.sample_rate,
        frames_needed,
        "recording from input device"
    );
    let deadline = config.duration + STALL_GRACE;
    let raw = collect_samples(&setup, frames_needed, deadline)?;
    if raw.is_empty() {
        bail!("input device delivered no audio");
    }
    let samples = resample::linear_resample(&raw, setup.sample_rate, config.sample_rate)?;
    Ok(Waveform {
        samples,
        sample_rate: config.sample_rate,
    })
}

fn select_device(config: &CaptureConfig) -> Result<Device> {
    let host = cpal::default_host();
    if let Some(name) = config.device_name.as_deref() {
        let mut devices = host
            .input_devices()
            .context("listing input devices failed")?;
        return devices
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| anyhow!("input device '{}' not found", name));
    }
    host.default_input_device()
        .context("no default input device available")
}

fn build_stream(device: &Device) -> Result<StreamSetup> {
    let supported = device
        .default_input_config()
        .context("failed to query default input config")?;
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: BufferSize::Default,
    };
    let (sender, receiver) = mpsc::sync_channel::<Vec<f32>>(CHANNEL_CAPACITY);
    let finished = Arc::new(AtomicBool::new(false));
    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_input_stream::<f32>(device, &stream_config, sender, &finished),
        SampleFormat::I16 => build_input_stream::<i16>(device, &stream_config, sender, &finished),
        SampleFormat::I32 => build_input_stream::<i32>(device, &stream_config, sender, &finished),
        SampleFormat::U16 => build_input_stream::<u16>(device, &stream_config, sender, &finished),
        other => Err(anyhow!("unsupported input sample format {:?}", other)),
    }?;
    Ok(StreamSetup {
        stream,
        receiver,
        finished,
        sample_rate: stream_config.sample_rate.0,
    })
}

fn build_input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sender: SyncSender<Vec<f32>>,
    finished: &Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let finished = finished.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if finished.load(Ordering::Relaxed) || channels == 0 {
                    return;
                }
                let mono: Vec<f32> = data
                    .chunks(channels)
                    .map(|frame| {
                        frame.iter().map(|&s| f32::from_sample(s)).sum::<f32>()
                            / frame.len() as f32
                    })
                    .collect();
                let _ = sender.try_send(mono);
            },
            |err| error!(error = %err, "audio input stream error"),
            None,
        )
        .map_err(|err| anyhow!(err))
        .context("failed to build input stream")
}

fn collect_samples(
    setup: &StreamSetup,
    frames_needed: usize,
    deadline: Duration,
) -> Result<Vec<f32>> {
    setup
        .stream
        .play()
        .context("failed to start capture stream")?;
    let started = Instant::now();
    let mut collected = Vec::with_capacity(frames_needed);
    while collected.len() < frames_needed {
        if started.elapsed() > deadline {
            setup.finished.store(true, Ordering::SeqCst);
            bail!(
                "input device stalled after {} of {} frames",
                collected.len(),
                frames_needed
            );
        }
        match setup.receiver.recv_timeout(POLL_INTERVAL) {
            Ok(chunk) => {
                let remaining = frames_needed - collected.len();
                collected.extend(chunk.into_iter().take(remaining));
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    setup.finished.store(true, Ordering::SeqCst);
    setup.stream.pause().ok();
    debug!(frames = collected.len(), "capture finished");
    Ok(collected)
}

fn frames_for_duration(duration: Duration, sample_rate: u32) -> usize {
    (duration.as_secs_f64() * sample_rate as f64).ceil() as usize
}

/// Average one interleaved frame down to a single channel.
pub fn mix_to_mono(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    frame.iter().sum::<f32>() / frame.len() as f32
}
