//! Real-input FFT used for fragment cross-correlation.
//!
//! A real sequence of length `2m` is packed into `m` complex points, run
//! through a radix-2 complex FFT of size `m`, then split into the `m + 1`
//! non-redundant bins of the full spectrum. The inverse undoes the split and
//! scales by `1 / 2m`, so `inverse(forward(x)) == x`.

use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

use crate::audio::buffer::try_vec;
use crate::common::errors::{CodecError, CodecResult};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    pub fn conj(self) -> Self {
        Self::new(self.re, -self.im)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.re * k, self.im * k)
    }

    /// Multiply by `i`.
    fn rotate(self) -> Self {
        Self::new(-self.im, self.re)
    }

    fn from_angle(theta: f64) -> Self {
        Self::new(theta.cos() as f32, theta.sin() as f32)
    }
}

impl Add for Complex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

pub struct RealFft {
    /// Complex FFT size (half the real length).
    half: usize,
    /// `e^{-2πik/half}` for `k < half / 2`.
    twiddles: Vec<Complex>,
    /// `e^{-2πik/(2·half)}` for `k <= half`.
    split: Vec<Complex>,
    scratch: Vec<Complex>,
}

impl RealFft {
    /// Plan a transform over `len` real samples. `len` must be a power of
    /// two and at least 2.
    pub fn new(len: usize) -> CodecResult<Self> {
        if len < 2 || !len.is_power_of_two() {
            return Err(CodecError::unsupported(format!(
                "fft length {len} is not a power of two"
            )));
        }
        let half = len / 2;

        let mut twiddles = try_vec(half / 2, Complex::default())?;
        for (k, w) in twiddles.iter_mut().enumerate() {
            *w = Complex::from_angle(-2.0 * PI * k as f64 / half as f64);
        }
        let mut split = try_vec(half + 1, Complex::default())?;
        for (k, w) in split.iter_mut().enumerate() {
            *w = Complex::from_angle(-PI * k as f64 / half as f64);
        }

        Ok(Self {
            half,
            twiddles,
            split,
            scratch: try_vec(half, Complex::default())?,
        })
    }

    /// Real input length.
    pub fn len(&self) -> usize {
        self.half * 2
    }

    /// Number of spectrum bins produced by [`forward`](Self::forward).
    pub fn bins(&self) -> usize {
        self.half + 1
    }

    pub fn forward(&mut self, input: &[f32], spectrum: &mut [Complex]) {
        let m = self.half;
        debug_assert!(input.len() >= 2 * m && spectrum.len() > m);

        for (k, z) in self.scratch.iter_mut().enumerate() {
            *z = Complex::new(input[2 * k], input[2 * k + 1]);
        }
        transform(&mut self.scratch, &self.twiddles, false);

        for k in 0..=m {
            let zk = self.scratch[k % m];
            let zn = self.scratch[(m - k) % m].conj();
            let even = (zk + zn).scale(0.5);
            // (zk - zn) / 2i
            let diff = zk - zn;
            let odd = Complex::new(diff.im, -diff.re).scale(0.5);
            spectrum[k] = even + self.split[k] * odd;
        }
    }

    pub fn inverse(&mut self, spectrum: &[Complex], output: &mut [f32]) {
        let m = self.half;
        debug_assert!(spectrum.len() > m && output.len() >= 2 * m);

        for k in 0..m {
            let xk = spectrum[k];
            let xn = spectrum[m - k].conj();
            let even = (xk + xn).scale(0.5);
            let odd = ((xk - xn) * self.split[k].conj()).scale(0.5);
            self.scratch[k] = even + odd.rotate();
        }
        transform(&mut self.scratch, &self.twiddles, true);

        let norm = 1.0 / m as f32;
        for (k, z) in self.scratch.iter().enumerate() {
            output[2 * k] = z.re * norm;
            output[2 * k + 1] = z.im * norm;
        }
    }
}

/// In-place iterative radix-2 FFT. The inverse is left unscaled.
fn transform(data: &mut [Complex], twiddles: &[Complex], inverse: bool) {
    let n = data.len();
    if n < 2 {
        return;
    }

    let mut j = 0;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j |= bit;
        if i < j {
            data.swap(i, j);
        }
    }

    let mut len = 2;
    while len <= n {
        let step = n / len;
        for chunk in data.chunks_exact_mut(len) {
            let (lo, hi) = chunk.split_at_mut(len / 2);
            for (k, (a, b)) in lo.iter_mut().zip(hi.iter_mut()).enumerate() {
                let w = twiddles[k * step];
                let w = if inverse { w.conj() } else { w };
                let t = *b * w;
                *b = *a - t;
                *a = *a + t;
            }
        }
        len <<= 1;
    }
}
