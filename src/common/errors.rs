use thiserror::Error;

/// Fatal conditions surfaced by sources, transforms, allocators and sinks.
///
/// "Try again" and "end of stream" are not errors and never appear here; they
/// travel in the `Ok` channel as [`Pull::Again`](crate::audio::engine::Pull)
/// and [`Pull::Eof`](crate::audio::engine::Pull).
#[derive(Error, Debug)]
pub enum CodecError {
    /// An allocation could not be satisfied (or would exceed the configured cap).
    #[error("out of memory: failed to allocate {requested} bytes")]
    OutOfMemory { requested: usize },

    /// Parameter or format incompatibility detected at setup.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A recognised option was given a value it does not accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Runtime command not understood by the transform.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The sink refuses units larger than its bound.
    #[error("packet of {size} bytes exceeds sink limit of {max} bytes")]
    PacketTooLarge { size: usize, max: usize },

    /// The downstream consumer went away.
    #[error("packet sink closed")]
    SinkClosed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

pub type CodecResult<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CodecError::OutOfMemory { requested: 4096 };
        assert_eq!(err.to_string(), "out of memory: failed to allocate 4096 bytes");

        let err = CodecError::PacketTooLarge { size: 10, max: 4 };
        assert_eq!(err.to_string(), "packet of 10 bytes exceeds sink limit of 4 bytes");
    }

    #[test]
    fn io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: CodecError = io_err.into();
        assert!(matches!(err, CodecError::Io(_)));
    }

    #[test]
    fn helpers_pick_variant() {
        assert!(matches!(CodecError::invalid("tempo"), CodecError::InvalidArgument(m) if m == "tempo"));
        assert!(matches!(CodecError::unsupported("planar"), CodecError::Unsupported(m) if m == "planar"));
    }
}
