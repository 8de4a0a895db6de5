pub mod buffer;
pub mod codecs;
pub mod constants;
pub mod engine;
pub mod filters;
pub mod format;
pub mod frame;
pub mod sample;

pub use buffer::{BufferPool, SampleRing};
pub use engine::{EncodeDriver, FrameSource, PacketAllocator, PacketSink, Pull, Transform, TransformOutcome};
pub use format::{PixelFormat, SampleFormat};
pub use frame::{AudioFrame, Frame, Packet, VideoFrame};
pub use sample::Sample;
