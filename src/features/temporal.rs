pub(crate) const FRAME_LENGTH: usize = 2048;
pub(crate) const HOP_LENGTH: usize = 512;

/// Mean root-mean-square energy across frames.
pub(crate) fn rms_mean(samples: &[f32]) -> f32 {
    mean_over_frames(samples, |frame, _| {
        let energy: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (energy / frame.len() as f64).sqrt()
    })
}

/// Mean fraction of sign changes per frame. Zero counts as positive.
/// Only pairs of real samples are compared, so the zero pad never crosses.
pub(crate) fn zero_crossing_mean(samples: &[f32]) -> f32 {
    mean_over_frames(samples, |frame, real| {
        let crossings = frame[..real]
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count();
        crossings as f64 / frame.len() as f64
    })
}

/// `per_frame` sees each padded frame and how many of its leading samples
/// are real.
fn mean_over_frames<F>(samples: &[f32], per_frame: F) -> f32
where
    F: Fn(&[f32], usize) -> f64,
{
    let padded = pad_to_whole_frames(samples);
    let count = frame_count(padded.len());
    let total: f64 = (0..count)
        .map(|i| {
            let start = i * HOP_LENGTH;
            let real = samples.len().saturating_sub(start).min(FRAME_LENGTH);
            per_frame(&padded[start..start + FRAME_LENGTH], real)
        })
        .sum();
    (total / count as f64) as f32
}

fn frame_count(len: usize) -> usize {
    1 + len.saturating_sub(FRAME_LENGTH) / HOP_LENGTH
}

fn pad_to_whole_frames(samples: &[f32]) -> Vec<f32> {
    let mut padded = samples.to_vec();
    if padded.len() <= FRAME_LENGTH {
        padded.resize(FRAME_LENGTH, 0.0);
        return padded;
    }
    let overhang = (padded.len() - FRAME_LENGTH) % HOP_LENGTH;
    if overhang != 0 {
        padded.resize(padded.len() + HOP_LENGTH - overhang, 0.0);
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_signal_has_no_crossings() {
        assert_eq!(zero_crossing_mean(&[0.0; 22_050]), 0.0);
        assert_eq!(zero_crossing_mean(&[0.3; 5_000]), 0.0);
    }

    #[test]
    fn negative_constant_does_not_cross_into_the_pad() {
        assert_eq!(zero_crossing_mean(&[-0.25; 22_050]), 0.0);
        assert_eq!(zero_crossing_mean(&[-0.25; 100]), 0.0);
    }

    #[test]
    fn crossings_in_a_partial_tail_frame_still_count() {
        let samples = [-0.5, 0.5, -0.5, 0.5];
        let zcr = zero_crossing_mean(&samples);
        assert!((zcr - 3.0 / FRAME_LENGTH as f32).abs() < 1e-9);
    }

    #[test]
    fn alternating_signal_crosses_every_sample() {
        let samples: Vec<f32> = (0..FRAME_LENGTH)
            .map(|i| if i % 2 == 0 { 0.5 } else { -0.5 })
            .collect();
        let zcr = zero_crossing_mean(&samples);
        let expected = (FRAME_LENGTH - 1) as f32 / FRAME_LENGTH as f32;
        assert!((zcr - expected).abs() < 1e-6);
    }

    #[test]
    fn rms_of_full_scale_constant() {
        let rms = rms_mean(&[0.5; FRAME_LENGTH * 2]);
        assert!((rms - 0.5).abs() < 1e-6);
    }

    #[test]
    fn padding_covers_the_tail() {
        let padded = pad_to_whole_frames(&[1.0; FRAME_LENGTH + 10]);
        assert_eq!(padded.len(), FRAME_LENGTH + HOP_LENGTH);
        assert_eq!(frame_count(padded.len()), 2);
    }
}
