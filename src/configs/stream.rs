use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::audio::codecs::AudioParams;
use crate::audio::format::SampleFormat;
use crate::common::errors::{CodecError, CodecResult};

/// Raw PCM input and output files.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StreamConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub sample_format: SampleFormat,
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel in each frame read from `input`.
    pub frame_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input.raw"),
            output: PathBuf::from("output.raw"),
            sample_format: SampleFormat::S16,
            sample_rate: 48_000,
            channels: 2,
            frame_size: 1024,
        }
    }
}

impl StreamConfig {
    pub fn params(&self) -> AudioParams {
        AudioParams::new(self.sample_format, self.channels, self.sample_rate)
    }

    pub fn validate(&self) -> CodecResult<()> {
        self.params().validate()?;
        if self.frame_size == 0 {
            return Err(CodecError::invalid("stream.frame_size must be positive"));
        }
        Ok(())
    }
}
