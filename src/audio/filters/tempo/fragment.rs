use super::fft::{Complex, RealFft};
use crate::audio::buffer::try_vec;
use crate::audio::sample::Sample;
use crate::common::errors::CodecResult;

/// One analysis window of the stream.
///
/// `position[0]` is where the fragment starts in the input timeline,
/// `position[1]` where it lands in the output timeline.
pub struct Fragment<S> {
    pub position: [i64; 2],
    /// Valid multi-channel samples in `data`, at most one window.
    pub nsamples: usize,
    pub data: Vec<S>,
    /// Spectrum of the down-mixed fragment, `window + 1` bins.
    pub xdat: Vec<Complex>,
}

impl<S: Sample> Fragment<S> {
    pub fn new(window: usize, channels: usize) -> CodecResult<Self> {
        Ok(Self {
            position: [0, 0],
            nsamples: 0,
            data: try_vec(window * channels, S::default())?,
            xdat: try_vec(window + 1, Complex::default())?,
        })
    }

    /// Input position one past the last valid sample.
    pub fn input_end(&self) -> i64 {
        self.position[0] + self.nsamples as i64
    }

    pub fn output_end(&self) -> i64 {
        self.position[1] + self.nsamples as i64
    }

    /// Recompute `xdat` from the current samples.
    ///
    /// `mono` is scratch of at least `fft.len()` values; everything past
    /// `nsamples` is zero padding.
    pub fn analyze(&mut self, channels: usize, fft: &mut RealFft, mono: &mut [f32]) {
        downmix(&self.data[..self.nsamples * channels], channels, mono);
        mono[self.nsamples..].fill(0.0);
        fft.forward(mono, &mut self.xdat);
    }
}

/// Collapse interleaved samples to mono by keeping, per position, the
/// channel value with the largest magnitude (clamped to `S::PEAK` when
/// comparing). The first channel wins ties.
pub fn downmix<S: Sample>(data: &[S], channels: usize, mono: &mut [f32]) {
    if channels == 1 {
        for (out, s) in mono.iter_mut().zip(data) {
            *out = s.to_f32();
        }
        return;
    }

    for (out, frame) in mono.iter_mut().zip(data.chunks_exact(channels)) {
        let mut max = frame[0].to_f32();
        let mut level = max.abs().min(S::PEAK);
        for s in &frame[1..] {
            let v = s.to_f32();
            let l = v.abs().min(S::PEAK);
            if level < l {
                level = l;
                max = v;
            }
        }
        *out = max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_keeps_loudest_channel() {
        let data = [0.1f32, -0.7, 0.4, 0.3, -0.2, 0.2];
        let mut mono = [0.0; 3];
        downmix(&data, 2, &mut mono);
        assert_eq!(mono, [-0.7, 0.4, -0.2]);
    }

    #[test]
    fn downmix_clamps_before_comparing() {
        // both channels exceed the i16 peak once widened; the first one wins
        let data = [-32768i16, 32767];
        let mut mono = [0.0; 1];
        downmix(&data, 2, &mut mono);
        assert_eq!(mono[0], -32768.0);
    }

    #[test]
    fn analyze_zero_pads() {
        let mut frag = Fragment::<f32>::new(4, 1).unwrap();
        frag.data.copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);
        frag.nsamples = 2;

        let mut fft = RealFft::new(8).unwrap();
        let mut mono = vec![9.0; 8];
        frag.analyze(1, &mut fft, &mut mono);

        assert_eq!(&mono[..], &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        // DC bin is the sum of the valid samples
        assert!((frag.xdat[0].re - 2.0).abs() < 1e-6);
    }
}
