use aus::analysis;
use aus::analysis::mel::MelFilterbank;
use aus::spectrum;
use aus::WindowType;
use ndarray::Array2;

use super::statistics::{array_from_frames, power_to_db};
use crate::types::Waveform;

pub(crate) const N_FFT: usize = 2048;
pub(crate) const HOP_LENGTH: usize = 512;
pub(crate) const MEL_BANDS: usize = 128;
const MIN_FREQ: f64 = 0.0;

/// Frame-major (frames x bins) spectra of one waveform.
pub(crate) struct SpectrogramBundle {
    pub power: Array2<f32>,
    pub mel_db: Array2<f32>,
    pub freqs: Vec<f64>,
}

pub(crate) fn compute_spectrograms(waveform: &Waveform) -> SpectrogramBundle {
    let mut audio: Vec<f64> = waveform.samples.iter().map(|&s| s as f64).collect();
    if audio.len() < N_FFT {
        audio.resize(N_FFT, 0.0);
    }

    let stft = spectrum::rstft(&audio, N_FFT, HOP_LENGTH, WindowType::Hanning);
    let (magnitude, _) = spectrum::complex_to_polar_rstft(&stft);
    let power = analysis::make_power_spectrogram(&magnitude);

    let freqs = spectrum::rfftfreq(N_FFT, waveform.sample_rate);
    let filterbank = MelFilterbank::new(
        MIN_FREQ,
        waveform.sample_rate as f64 / 2.0,
        MEL_BANDS,
        &freqs,
        true,
    );
    let mel = analysis::mel::make_mel_spectrogram(&power, &filterbank);

    SpectrogramBundle {
        power: array_from_frames(&power),
        mel_db: power_to_db(&array_from_frames(&mel)),
        freqs,
    }
}
