//! The numeric trait every tempo and PCM routine is generic over.
//!
//! Two value domains are exposed:
//!
//! | Method | Domain | Used by |
//! |---|---|---|
//! | [`Sample::to_f32`] / [`Sample::from_f32`] | raw scalar value | WSOLA down-mix and blending |
//! | [`Sample::to_unit`] / [`Sample::from_unit`] | normalized `[-1.0, 1.0]` | PCM format conversion |

use crate::audio::format::SampleFormat;

pub trait Sample: Copy + Default + PartialEq + PartialOrd + Send + Sync + std::fmt::Debug + 'static {
    const FORMAT: SampleFormat;

    /// Magnitude ceiling applied when comparing channels during down-mix.
    const PEAK: f32;

    fn to_f32(self) -> f32;

    /// Truncating, saturating conversion back from the raw domain.
    fn from_f32(value: f32) -> Self;

    fn to_unit(self) -> f64;

    fn from_unit(value: f64) -> Self;

    /// Decode one sample from little-endian bytes (`bytes.len() >= FORMAT.bytes_per_sample()`).
    fn read_le(bytes: &[u8]) -> Self;

    fn write_le(self, out: &mut [u8]);
}

macro_rules! le_bytes {
    ($ty:ty, $n:literal) => {
        fn read_le(bytes: &[u8]) -> Self {
            let mut raw = [0u8; $n];
            raw.copy_from_slice(&bytes[..$n]);
            <$ty>::from_le_bytes(raw)
        }

        fn write_le(self, out: &mut [u8]) {
            out[..$n].copy_from_slice(&self.to_le_bytes());
        }
    };
}

impl Sample for u8 {
    const FORMAT: SampleFormat = SampleFormat::U8;
    const PEAK: f32 = 127.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value as u8
    }

    fn to_unit(self) -> f64 {
        (self as f64 - 128.0) / 128.0
    }

    fn from_unit(value: f64) -> Self {
        (value * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8
    }

    le_bytes!(u8, 1);
}

impl Sample for i16 {
    const FORMAT: SampleFormat = SampleFormat::S16;
    const PEAK: f32 = 32_767.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value as i16
    }

    fn to_unit(self) -> f64 {
        self as f64 / 32_768.0
    }

    fn from_unit(value: f64) -> Self {
        (value * 32_768.0).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }

    le_bytes!(i16, 2);
}

impl Sample for i32 {
    const FORMAT: SampleFormat = SampleFormat::S32;
    const PEAK: f32 = 2_147_483_647.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value as i32
    }

    fn to_unit(self) -> f64 {
        self as f64 / 2_147_483_648.0
    }

    fn from_unit(value: f64) -> Self {
        (value * 2_147_483_648.0).round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
    }

    le_bytes!(i32, 4);
}

impl Sample for f32 {
    const FORMAT: SampleFormat = SampleFormat::F32;
    const PEAK: f32 = 1.0;

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Self {
        value
    }

    fn to_unit(self) -> f64 {
        self as f64
    }

    fn from_unit(value: f64) -> Self {
        value as f32
    }

    le_bytes!(f32, 4);
}

impl Sample for f64 {
    const FORMAT: SampleFormat = SampleFormat::F64;
    const PEAK: f32 = 1.0;

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Self {
        value as f64
    }

    fn to_unit(self) -> f64 {
        self
    }

    fn from_unit(value: f64) -> Self {
        value
    }

    le_bytes!(f64, 8);
}

/// Decode packed little-endian bytes, appending to `out`. Trailing bytes that
/// do not form a whole sample are ignored.
pub fn decode_le<S: Sample>(bytes: &[u8], out: &mut Vec<S>) {
    let width = S::FORMAT.bytes_per_sample();
    out.reserve(bytes.len() / width);
    out.extend(bytes.chunks_exact(width).map(S::read_le));
}

/// Encode samples into `out`, which must hold `samples.len() * width` bytes.
pub fn encode_le<S: Sample>(samples: &[S], out: &mut [u8]) {
    let width = S::FORMAT.bytes_per_sample();
    for (sample, chunk) in samples.iter().zip(out.chunks_exact_mut(width)) {
        sample.write_le(chunk);
    }
}
