use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::types::AnyResult;
use crate::configs::*;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub tempo: TempoConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
}

impl Config {
    /// Load `config.toml`, falling back to `config.default.toml`.
    pub fn load() -> AnyResult<Self> {
        let config_path = if Path::new("config.toml").exists() {
            "config.toml"
        } else if Path::new("config.default.toml").exists() {
            "config.default.toml"
        } else {
            return Err("config.toml or config.default.toml not found".into());
        };
        Self::load_from(config_path)
    }

    pub fn load_from(path: impl AsRef<Path>) -> AnyResult<Self> {
        let path = path.as_ref();
        crate::log_println!("Loading configuration from: {}", path.display());

        let config_str = std::fs::read_to_string(path)?;
        if config_str.trim().is_empty() {
            return Err(format!("{} is empty", path.display()).into());
        }
        Self::from_toml_str(&config_str)
    }

    pub fn from_toml_str(s: &str) -> AnyResult<Self> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AnyResult<()> {
        self.stream.validate()?;
        self.tempo.validate()?;
        self.encoder.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::codecs::CodecKind;
    use crate::audio::format::SampleFormat;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert!(config.logging.is_none());
        assert_eq!(config.stream.sample_format, SampleFormat::S16);
        assert_eq!(config.stream.sample_rate, 48_000);
        assert_eq!(config.tempo.tempo, 1.0);
        assert_eq!(config.encoder.codec, CodecKind::Tempo);
        assert_eq!(config.encoder.queue_depth, 64);
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::from_toml_str(
            r#"
            [logging]
            level = "debug"
            [logging.file]
            path = "logs/tempocodec.log"

            [stream]
            input = "in.f32"
            output = "out.f32"
            sample_format = "f32"
            sample_rate = 44100
            channels = 1
            frame_size = 512

            [tempo]
            tempo = 1.5

            [encoder]
            codec = "pcm"
            output_format = "s16"
            max_packet_size = 65536
            memory_limit = 1048576
            "#,
        )
        .unwrap();

        let logging = config.logging.unwrap();
        assert_eq!(logging.level.as_deref(), Some("debug"));
        assert_eq!(logging.file.unwrap().max_lines, 10_000);
        assert_eq!(config.stream.sample_format, SampleFormat::F32);
        assert_eq!(config.stream.frame_size, 512);
        assert_eq!(config.tempo.tempo, 1.5);
        assert_eq!(config.encoder.codec, CodecKind::Pcm);
        assert_eq!(config.encoder.output_format, Some(SampleFormat::S16));
        assert_eq!(config.encoder.max_packet_size, Some(65_536));
        assert_eq!(config.encoder.packet_samples, 1024);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(Config::from_toml_str("[tempo]\ntempo = 0.25\n").is_err());
        assert!(Config::from_toml_str("[tempo]\ntempo = 101.0\n").is_err());
        assert!(Config::from_toml_str("[stream]\nchannels = 0\n").is_err());
        assert!(Config::from_toml_str("[stream]\nframe_size = 0\n").is_err());
        assert!(Config::from_toml_str("[encoder]\nqueue_depth = 0\n").is_err());
        assert!(Config::from_toml_str("[stream]\nsample_format = \"s24\"\n").is_err());
    }
}
