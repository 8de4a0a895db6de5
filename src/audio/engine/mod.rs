//! The pull/push encode contract.
//!
//! An [`EncodeDriver`] pulls raw frames from a [`FrameSource`], hands them to
//! a [`Transform`] and returns the packets it produces, which the caller (or
//! [`EncodeDriver::run`]) delivers to a [`PacketSink`].
//!
//! | Piece | Implementations |
//! |---|---|
//! | [`FrameSource`] | [`ChannelSource`], [`ReaderSource`] |
//! | [`PacketAllocator`] | [`HeapAllocator`], [`PooledAllocator`] |
//! | [`PacketSink`] | [`ChannelSink`], [`WriterSink`], [`CollectSink`] |
//!
//! "Try again" and "end of stream" are ordinary results ([`Pull::Again`],
//! [`Pull::Eof`]); only real failures use the `Err` channel.

pub mod alloc;
pub mod driver;
pub mod sink;
pub mod source;

pub use alloc::{HeapAllocator, PooledAllocator};
pub use driver::{DriverStats, EncodeDriver};
pub use sink::{ChannelSink, CollectSink, WriterSink};
pub use source::{ChannelSource, ReaderSource};

use crate::audio::constants::MIN_PACKET_SCRATCH;
use crate::audio::frame::{Frame, Packet};
use crate::common::errors::{CodecError, CodecResult};

/// Result of a non-blocking request.
#[derive(Debug, Clone, PartialEq)]
pub enum Pull<T> {
    Ready(T),
    /// Nothing available now; more may arrive later.
    Again,
    /// Permanently exhausted.
    Eof,
}

impl<T> Pull<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Pull<U> {
        match self {
            Self::Ready(v) => Pull::Ready(f(v)),
            Self::Again => Pull::Again,
            Self::Eof => Pull::Eof,
        }
    }
}

// ─── Collaborators ────────────────────────────────────────────────────────────

/// Producer of raw frames.
pub trait FrameSource: Send {
    /// Never blocks. Once `Eof` is returned every later call returns `Eof`.
    fn get_frame(&mut self) -> CodecResult<Pull<Frame>>;

    /// Block until `get_frame` is likely to return something other than
    /// `Again`. The default returns immediately.
    fn wait(&mut self) -> CodecResult<()> {
        Ok(())
    }
}

/// Consumer of finished packets.
pub trait PacketSink: Send {
    /// Take ownership of `packet`. May block while the consumer catches up.
    fn write_packet(&mut self, packet: Packet) -> CodecResult<()>;

    /// Called once after the last packet.
    fn finish(&mut self) -> CodecResult<()> {
        Ok(())
    }
}

/// Source of packet payload buffers.
pub trait PacketAllocator: Send {
    /// A packet whose payload is exactly `size` zeroed bytes.
    fn get_encode_buffer(&mut self, size: usize) -> CodecResult<Packet>;

    /// A scratch packet of at least `upper_bound` bytes (and never less than
    /// [`MIN_PACKET_SCRATCH`]); the caller truncates it to what it wrote.
    fn alloc_packet(&mut self, upper_bound: usize) -> CodecResult<Packet> {
        self.get_encode_buffer(upper_bound.max(MIN_PACKET_SCRATCH))
    }
}

// ─── Transform ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Output lags input, so packets are still due after the last frame.
    pub delay: bool,
}

/// What a [`Transform`] did with the frame it was offered.
#[derive(Debug, PartialEq)]
pub enum TransformOutcome {
    /// The frame was fully used, optionally yielding a packet.
    Consumed(Option<Packet>),
    /// The frame was not taken; offer the same frame again later.
    Again,
    /// A packet was produced; offer the same frame again.
    Partial(Packet),
    /// Draining is complete. Only valid once input has ended.
    Eof,
}

/// A stateful frame-to-packet stage.
pub trait Transform: Send {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Offer `frame`, or `None` once input has ended to drain buffered state.
    fn transform(
        &mut self,
        frame: Option<&Frame>,
        alloc: &mut dyn PacketAllocator,
    ) -> CodecResult<TransformOutcome>;

    /// Adjust a runtime parameter.
    fn command(&mut self, name: &str, _arg: &str) -> CodecResult<()> {
        Err(CodecError::UnknownCommand(name.to_string()))
    }

    /// Forget all buffered state, keeping configuration.
    fn reset(&mut self) {}
}

/// Type-erased transform.
pub type BoxedTransform = Box<dyn Transform>;
