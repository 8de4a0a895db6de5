use serde::{Deserialize, Serialize};

use crate::audio::filters::tempo::validate_tempo;
use crate::common::errors::CodecResult;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TempoConfig {
    pub tempo: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self { tempo: 1.0 }
    }
}

impl TempoConfig {
    pub fn validate(&self) -> CodecResult<()> {
        validate_tempo(self.tempo).map(|_| ())
    }
}
