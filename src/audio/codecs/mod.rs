//! Concrete [`Transform`](crate::audio::engine::Transform)s.
//!
//! | Codec | Input | Output |
//! |---|---|---|
//! | [`TempoEncoder`] | packed PCM | tempo-scaled packed PCM, same format |
//! | [`PcmEncoder`] | packed PCM | fixed-size PCM packets, any sample format |
//! | [`RawVideoEncoder`] | pixel grid | stride-free pixel rows |

pub mod pcm;
pub mod rawvideo;
pub mod tempo;

pub use pcm::PcmEncoder;
pub use rawvideo::RawVideoEncoder;
pub use tempo::TempoEncoder;

use serde::{Deserialize, Serialize};

use crate::audio::engine::BoxedTransform;
use crate::audio::format::SampleFormat;
use crate::audio::frame::{AudioFrame, Frame};
use crate::common::errors::{CodecError, CodecResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Tempo,
    Pcm,
}

/// Shape of a PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioParams {
    pub format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioParams {
    pub fn new(format: SampleFormat, channels: u16, sample_rate: u32) -> Self {
        Self {
            format,
            channels,
            sample_rate,
        }
    }

    pub fn validate(&self) -> CodecResult<()> {
        if self.channels == 0 {
            return Err(CodecError::unsupported("zero channels"));
        }
        if self.sample_rate == 0 {
            return Err(CodecError::unsupported("zero sample rate"));
        }
        Ok(())
    }

    /// Bytes per multi-channel sample.
    pub fn stride(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Borrow `frame` as audio matching these parameters.
    pub fn accept<'a>(&self, frame: &'a Frame) -> CodecResult<&'a AudioFrame> {
        let audio = frame
            .as_audio()
            .ok_or_else(|| CodecError::unsupported("expected an audio frame"))?;

        if audio.format != self.format
            || audio.channels != self.channels
            || audio.sample_rate != self.sample_rate
        {
            return Err(CodecError::unsupported(format!(
                "frame is {} {} ch {} Hz, stream is {} {} ch {} Hz",
                audio.format,
                audio.channels,
                audio.sample_rate,
                self.format,
                self.channels,
                self.sample_rate
            )));
        }
        Ok(audio)
    }
}

/// Build the audio transform named by `kind`.
///
/// `output_format` and `packet_samples` only apply to [`CodecKind::Pcm`];
/// `tempo` only to [`CodecKind::Tempo`].
pub fn build_audio_transform(
    kind: CodecKind,
    params: AudioParams,
    tempo: f64,
    output_format: SampleFormat,
    packet_samples: usize,
) -> CodecResult<BoxedTransform> {
    Ok(match kind {
        CodecKind::Tempo => Box::new(TempoEncoder::new(params, tempo)?),
        CodecKind::Pcm => Box::new(PcmEncoder::new(params, output_format, packet_samples)?),
    })
}
