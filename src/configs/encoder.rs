use serde::{Deserialize, Serialize};

use crate::audio::codecs::CodecKind;
use crate::audio::constants::DEFAULT_QUEUE_DEPTH;
use crate::audio::format::SampleFormat;
use crate::common::errors::{CodecError, CodecResult};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EncoderConfig {
    pub codec: CodecKind,
    /// Output sample format of the `pcm` codec; the input format when unset.
    pub output_format: Option<SampleFormat>,
    /// Samples per channel in each `pcm` packet.
    pub packet_samples: usize,
    pub max_packet_size: Option<usize>,
    /// Capacity of the frame and packet channels.
    pub queue_depth: usize,
    /// Largest single packet allocation, in bytes.
    pub memory_limit: Option<usize>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            codec: CodecKind::default(),
            output_format: None,
            packet_samples: 1024,
            max_packet_size: None,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            memory_limit: None,
        }
    }
}

impl EncoderConfig {
    pub fn validate(&self) -> CodecResult<()> {
        if self.queue_depth == 0 {
            return Err(CodecError::invalid("encoder.queue_depth must be positive"));
        }
        if self.packet_samples == 0 {
            return Err(CodecError::invalid("encoder.packet_samples must be positive"));
        }
        if self.max_packet_size == Some(0) {
            return Err(CodecError::invalid("encoder.max_packet_size must be positive"));
        }
        Ok(())
    }
}
