//! Fragment alignment by frequency-domain cross-correlation.
//!
//! The correlation of the previous fragment `a` against the current one `b`
//! is `IFFT(A · conj(B))`; index `i` scores shifting `b` by `i - window/2`
//! samples. Only shifts within half a window of the drift-compensated
//! target are considered.

use super::fft::{Complex, RealFft};

/// Signed sample offset that best aligns `curr` with `prev`.
///
/// `spectrum` must hold `window + 1` bins and `correlation` `2 * window`
/// values.
pub fn align(
    prev: &[Complex],
    curr: &[Complex],
    window: usize,
    drift: i64,
    fft: &mut RealFft,
    spectrum: &mut [Complex],
    correlation: &mut [f32],
) -> i64 {
    for ((out, a), b) in spectrum.iter_mut().zip(prev).zip(curr).take(window + 1) {
        *out = *a * b.conj();
    }
    fft.inverse(spectrum, correlation);
    search_peak(correlation, window, drift)
}

/// Pick the best correlation index inside the drift-bounded search window.
///
/// Each candidate is weighted by a triangular taper over the window and by
/// `drift + i`, which favours larger shifts. Returns `-drift` when the
/// window is empty.
pub fn search_peak(correlation: &[f32], window: usize, drift: i64) -> i64 {
    let n = window as i64;
    let half = n / 2;
    let delta_max = half;

    let i0 = (half - delta_max - drift).max(0).min(n);
    let i1 = (half + delta_max - drift).min(n - n / 16).max(0);

    let mut best_offset = -drift;
    let mut best_metric = f32::MIN;

    for i in i0..i1 {
        let drifti = (drift + i) as f32;
        let metric = correlation[i as usize] * (drifti * (i - i0) as f32 * (i1 - i) as f32);
        if metric > best_metric {
            best_metric = metric;
            best_offset = i - half;
        }
    }

    best_offset
}

/// Distance, in output samples, between where the previous fragment landed
/// and where it would have landed at the exact tempo.
pub fn drift(prev_position: [i64; 2], origin: [i64; 2], window: usize, tempo: f64) -> i64 {
    let half = (window / 2) as i64;
    let actual = (prev_position[1] - origin[1] + half) as f64;
    let ideal = (prev_position[0] - origin[0] + half) as f64 / tempo;
    (actual - ideal) as i64
}
