use super::fragment::Fragment;
use crate::audio::sample::Sample;

/// `h[i] = 0.5 * (1 - cos(2πi / (window - 1)))`.
pub fn hann(window: usize) -> Vec<f32> {
    let denom = window.saturating_sub(1).max(1) as f64;
    (0..window)
        .map(|i| {
            let t = i as f64 / denom;
            (0.5 * (1.0 - (2.0 * std::f64::consts::PI * t).cos())) as f32
        })
        .collect()
}

/// Blend the region where `prev` and `curr` overlap in the output timeline,
/// starting at `*cursor`, appending interleaved samples to `dst` until it
/// holds `limit` values.
///
/// Samples whose position in `curr`'s input timeline is negative are copied
/// from `prev` unblended. Returns `true` once the cursor reaches the end of
/// the overlap, `false` when `dst` ran out of room first.
pub fn overlap_add<S: Sample>(
    prev: &Fragment<S>,
    curr: &Fragment<S>,
    hann: &[f32],
    channels: usize,
    cursor: &mut i64,
    dst: &mut Vec<S>,
    limit: usize,
) -> bool {
    let start = (*cursor).max(curr.position[1]);
    let stop = prev.output_end().min(curr.output_end());
    debug_assert!(curr.position[1] <= start);

    let overlap = (stop - start).max(0) as usize;
    let ia = (start - prev.position[1]) as usize;
    let ib = (start - curr.position[1]) as usize;

    let room = limit.saturating_sub(dst.len()) / channels;
    let count = overlap.min(room);

    for i in 0..count {
        let w0 = hann[ia + i];
        let w1 = hann[ib + i];
        let a = &prev.data[(ia + i) * channels..(ia + i + 1) * channels];
        let b = &curr.data[(ib + i) * channels..(ib + i + 1) * channels];

        if curr.position[0] + ((ib + i) as i64) < 0 {
            dst.extend_from_slice(a);
        } else {
            dst.extend(
                a.iter()
                    .zip(b)
                    .map(|(&t0, &t1)| S::from_f32(t0.to_f32() * w0 + t1.to_f32() * w1)),
            );
        }
    }

    *cursor = start + count as i64;
    *cursor >= stop
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(value: f32, position: [i64; 2], window: usize) -> Fragment<f32> {
        let mut frag = Fragment::new(window, 1).unwrap();
        frag.data.fill(value);
        frag.nsamples = window;
        frag.position = position;
        frag
    }

    #[test]
    fn hann_is_symmetric() {
        let h = hann(16);
        assert_eq!(h[0], 0.0);
        assert!(h[15].abs() < 1e-6);
        for i in 0..16 {
            assert!((h[i] - h[15 - i]).abs() < 1e-6);
        }
    }

    #[test]
    fn crossfade_has_unity_gain() {
        let window = 512;
        let h = hann(window);
        let prev = fragment(0.5, [0, 0], window);
        let curr = fragment(0.5, [256, 256], window);

        let mut cursor = 256;
        let mut out = Vec::new();
        assert!(overlap_add(&prev, &curr, &h, 1, &mut cursor, &mut out, usize::MAX));
        assert_eq!(out.len(), 256);
        assert_eq!(cursor, 512);

        // h[i + N/2] + h[i] == 1 up to the (N-1) period mismatch
        for v in &out {
            assert!((v - 0.5).abs() < 0.5 * 0.01, "{v}");
        }
    }

    #[test]
    fn resumes_after_short_destination() {
        let window = 16;
        let h = hann(window);
        let prev = fragment(1.0, [0, 0], window);
        let curr = fragment(-1.0, [8, 8], window);

        let mut whole = Vec::new();
        let mut cursor = 8;
        overlap_add(&prev, &curr, &h, 1, &mut cursor, &mut whole, usize::MAX);

        let mut pieces = Vec::new();
        let mut cursor = 8;
        let mut limit = 3;
        while !overlap_add(&prev, &curr, &h, 1, &mut cursor, &mut pieces, limit) {
            limit += 3;
        }
        assert_eq!(pieces, whole);
    }

    #[test]
    fn negative_input_positions_pass_through() {
        let window = 16;
        let h = hann(window);
        let prev = fragment(0.25, [-8, -8], window);
        let curr = fragment(0.75, [-4, 0], window);

        let mut cursor = 0;
        let mut out = Vec::new();
        overlap_add(&prev, &curr, &h, 1, &mut cursor, &mut out, usize::MAX);

        assert_eq!(out.len(), 8);
        assert!(out[..4].iter().all(|&v| v == 0.25));
        assert!(out[4..].iter().all(|&v| v != 0.25));
    }
}
