use std::f32::consts::PI;

use ndarray::{Array1, Array2, Axis};

/// Neighbours on each side of the regression delta. One frame gives the
/// central first difference `(c[t+1] - c[t-1]) / 2`.
pub(crate) const DELTA_WINDOW: usize = 1;
const EPSILON: f32 = 1e-12;
const AMIN: f32 = 1e-10;
const TOP_DB: f32 = 80.0;

pub(crate) fn array_from_frames(data: &[Vec<f64>]) -> Array2<f32> {
    let rows = data.len();
    let cols = data.iter().map(Vec::len).min().unwrap_or(0);
    Array2::from_shape_fn((rows, cols), |(r, c)| data[r][c] as f32)
}

/// Power to decibels relative to 1.0, floored `TOP_DB` below the peak.
pub(crate) fn power_to_db(power: &Array2<f32>) -> Array2<f32> {
    let db = power.mapv(|p| 10.0 * p.max(AMIN).log10());
    let peak = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !peak.is_finite() {
        return db;
    }
    let floor = peak - TOP_DB;
    db.mapv(|v| v.max(floor))
}

/// Orthonormal DCT-II basis, `n_out` rows over `n_in` inputs.
pub(crate) fn dct_matrix(n_out: usize, n_in: usize) -> Array2<f32> {
    let n = n_in.max(1) as f32;
    Array2::from_shape_fn((n_out, n_in), |(k, j)| {
        let norm = if k == 0 {
            (1.0 / n).sqrt()
        } else {
            (2.0 / n).sqrt()
        };
        norm * (PI * k as f32 * (j as f32 + 0.5) / n).cos()
    })
}

pub(crate) fn mfcc_matrix(mel_db: &Array2<f32>, n_mfcc: usize) -> Array2<f32> {
    let basis = dct_matrix(n_mfcc, mel_db.len_of(Axis(1)));
    mel_db.dot(&basis.t())
}

/// Regression delta along the frame axis; edge frames are clamped.
pub(crate) fn compute_delta_matrix(input: &Array2<f32>, window: usize) -> Array2<f32> {
    let frames = input.len_of(Axis(0));
    let coeffs = input.len_of(Axis(1));
    let mut output = Array2::zeros((frames, coeffs));
    if frames == 0 {
        return output;
    }
    let denominator = (2.0_f32 * (1..=window).map(|n| (n * n) as f32).sum::<f32>()).max(EPSILON);

    for t in 0..frames {
        let mut numerator = Array1::<f32>::zeros(coeffs);
        for n in 1..=window {
            let prev = input.row(t.saturating_sub(n));
            let next = input.row((t + n).min(frames - 1));
            numerator.scaled_add(n as f32, &(&next - &prev));
        }
        output.row_mut(t).assign(&(numerator / denominator));
    }

    output
}

/// Per-column mean over frames; zero when there are no frames.
pub(crate) fn frame_mean(matrix: &Array2<f32>) -> Array1<f32> {
    matrix
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(matrix.len_of(Axis(1))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn dct_basis_is_orthonormal() {
        let basis = dct_matrix(8, 8);
        let gram = basis.dot(&basis.t());
        for ((r, c), value) in gram.indexed_iter() {
            let expected = if r == c { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(*value, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn delta_of_linear_ramp_is_constant_inside() {
        let ramp = Array2::from_shape_fn((9, 1), |(t, _)| t as f32);
        let deltas = compute_delta_matrix(&ramp, DELTA_WINDOW);
        for t in 1..8 {
            assert_abs_diff_eq!(deltas[[t, 0]], 1.0, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(deltas[[0, 0]], 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(deltas[[8, 0]], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn delta_only_sees_adjacent_frames() {
        let step = array![[0.0_f32], [0.0], [0.0], [4.0], [4.0], [4.0]];
        let deltas = compute_delta_matrix(&step, DELTA_WINDOW);
        let expected = [0.0_f32, 0.0, 2.0, 2.0, 0.0, 0.0];
        for (t, value) in expected.iter().enumerate() {
            assert_abs_diff_eq!(deltas[[t, 0]], *value, epsilon = 1e-6);
        }
    }

    #[test]
    fn decibels_floor_below_peak() {
        let power = array![[1.0_f32, 0.0], [1e-12, 100.0]];
        let db = power_to_db(&power);
        assert_abs_diff_eq!(db[[0, 0]], 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(db[[1, 1]], 20.0, epsilon = 1e-5);
        assert_abs_diff_eq!(db[[0, 1]], -60.0, epsilon = 1e-5);
    }

    #[test]
    fn frame_mean_handles_empty_input() {
        let empty = Array2::<f32>::zeros((0, 3));
        assert_eq!(frame_mean(&empty), Array1::<f32>::zeros(3));
    }
}
