use ndarray::{Array2, Axis};

pub(crate) const CHROMA_BINS: usize = 12;
const A4_HZ: f64 = 440.0;
const A4_MIDI: f64 = 69.0;
// A0; bins below it only carry DC leakage.
const MIN_FREQ: f64 = 27.5;
const EPSILON: f32 = 1e-10;

/// Fold a power spectrogram (frames x bins) into pitch classes, C first.
pub(crate) fn chromagram(power: &Array2<f32>, freqs: &[f64]) -> Array2<f32> {
    let classes: Vec<Option<usize>> = freqs.iter().map(|&f| pitch_class(f)).collect();
    let frames = power.len_of(Axis(0));
    let mut chroma = Array2::<f32>::zeros((frames, CHROMA_BINS));

    for (frame, mut out) in power.outer_iter().zip(chroma.outer_iter_mut()) {
        for (value, class) in frame.iter().zip(classes.iter()) {
            if let Some(class) = class {
                out[*class] += *value;
            }
        }
        let peak = out.iter().copied().fold(0.0_f32, f32::max);
        if peak > EPSILON {
            out.mapv_inplace(|v| v / peak);
        }
    }

    chroma
}

fn pitch_class(freq: f64) -> Option<usize> {
    if !freq.is_finite() || freq < MIN_FREQ {
        return None;
    }
    let midi = (12.0 * (freq / A4_HZ).log2() + A4_MIDI).round() as i64;
    Some(midi.rem_euclid(CHROMA_BINS as i64) as usize)
}
