//! Sample and pixel format descriptors.
//!
//! Only packed (interleaved) layouts are represented: the tempo ring buffer
//! stores whole multi-channel samples, which planar data cannot provide
//! without a repack.

use serde::{Deserialize, Serialize};

/// Interleaved audio sample formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    U8,
    S16,
    S32,
    F32,
    F64,
}

impl SampleFormat {
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16 => 2,
            Self::S32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }
}

impl std::str::FromStr for SampleFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Ok(Self::U8),
            "s16" | "s16le" => Ok(Self::S16),
            "s32" | "s32le" => Ok(Self::S32),
            "f32" | "flt" | "f32le" => Ok(Self::F32),
            "f64" | "dbl" | "f64le" => Ok(Self::F64),
            other => Err(format!("unknown sample format '{other}'")),
        }
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Packed pixel formats accepted by the raw video packer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    Gray8,
    Rgb24,
    Rgba,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb24 => 3,
            Self::Rgba => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!("s16le".parse::<SampleFormat>(), Ok(SampleFormat::S16));
        assert_eq!("FLT".parse::<SampleFormat>(), Ok(SampleFormat::F32));
        assert!("s24".parse::<SampleFormat>().is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(SampleFormat::U8.bytes_per_sample(), 1);
        assert_eq!(SampleFormat::F64.bytes_per_sample(), 8);
        assert!(SampleFormat::F32.is_float());
        assert!(!SampleFormat::S32.is_float());
        assert_eq!(PixelFormat::Rgb24.bytes_per_pixel(), 3);
    }
}
