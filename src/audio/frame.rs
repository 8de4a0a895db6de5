//! Raw frames flowing into a transform and the compressed packets leaving it.
//!
//! Frames and packets are single-owner values: handing one to the next stage
//! is a move, so a packet can never be mutated after it reaches the sink.

use crate::audio::format::{PixelFormat, SampleFormat};
use crate::audio::sample::{Sample, decode_le, encode_le};

/// Interleaved little-endian PCM.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
    /// Samples per channel.
    pub samples: usize,
    pub data: Vec<u8>,
    /// Presentation timestamp in `1 / sample_rate` units.
    pub pts: Option<i64>,
}

impl AudioFrame {
    /// Wrap interleaved samples. A trailing partial multi-channel sample is dropped.
    pub fn from_samples<S: Sample>(samples: &[S], channels: u16, sample_rate: u32) -> Self {
        let ch = channels.max(1) as usize;
        let whole = samples.len() / ch * ch;
        let mut data = vec![0u8; whole * S::FORMAT.bytes_per_sample()];
        encode_le(&samples[..whole], &mut data);

        Self {
            format: S::FORMAT,
            channels,
            sample_rate,
            samples: whole / ch,
            data,
            pts: None,
        }
    }

    pub fn with_pts(mut self, pts: i64) -> Self {
        self.pts = Some(pts);
        self
    }

    /// Bytes per multi-channel sample.
    pub fn stride(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    pub fn duration(&self) -> i64 {
        self.samples as i64
    }

    /// Append the interleaved samples to `out`. Returns `None` when `S` does
    /// not match the frame's format.
    pub fn decode_into<S: Sample>(&self, out: &mut Vec<S>) -> Option<usize> {
        if S::FORMAT != self.format {
            return None;
        }
        let len = self.samples * self.stride();
        let before = out.len();
        decode_le(&self.data[..len.min(self.data.len())], out);
        Some(out.len() - before)
    }

    pub fn to_samples<S: Sample>(&self) -> Option<Vec<S>> {
        let mut out = Vec::new();
        self.decode_into(&mut out).map(|_| out)
    }
}

/// A packed pixel grid. `stride` may exceed `width * bytes_per_pixel`.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: Vec<u8>,
    pub pts: Option<i64>,
}

impl VideoFrame {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> Self {
        let stride = width as usize * format.bytes_per_pixel();
        Self {
            format,
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
            pts: None,
        }
    }

    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.row_bytes()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Audio(AudioFrame),
    Video(VideoFrame),
}

impl Frame {
    pub fn pts(&self) -> Option<i64> {
        match self {
            Self::Audio(f) => f.pts,
            Self::Video(f) => f.pts,
        }
    }

    /// Samples per channel for audio, 1 for a picture.
    pub fn units(&self) -> u64 {
        match self {
            Self::Audio(f) => f.samples as u64,
            Self::Video(_) => 1,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioFrame> {
        match self {
            Self::Audio(f) => Some(f),
            Self::Video(_) => None,
        }
    }

    pub fn as_video(&self) -> Option<&VideoFrame> {
        match self {
            Self::Video(f) => Some(f),
            Self::Audio(_) => None,
        }
    }
}

impl From<AudioFrame> for Frame {
    fn from(frame: AudioFrame) -> Self {
        Self::Audio(frame)
    }
}

impl From<VideoFrame> for Frame {
    fn from(frame: VideoFrame) -> Self {
        Self::Video(frame)
    }
}

/// One compressed unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Packet {
    pub data: Vec<u8>,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub key: bool,
}

impl Packet {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Shrink the payload to the bytes actually written.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len);
    }

    /// Hand the payload back, e.g. to return it to a pool.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}
