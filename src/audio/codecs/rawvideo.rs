//! Raw video packer: one stride-free picture per packet. Every packet is a
//! keyframe since no picture depends on another.

use crate::audio::engine::{PacketAllocator, Transform, TransformOutcome};
use crate::audio::format::PixelFormat;
use crate::audio::frame::{Frame, VideoFrame};
use crate::common::errors::{CodecError, CodecResult};

pub struct RawVideoEncoder {
    format: PixelFormat,
    width: u32,
    height: u32,
    frames_out: i64,
}

impl RawVideoEncoder {
    pub fn new(format: PixelFormat, width: u32, height: u32) -> CodecResult<Self> {
        if width == 0 || height == 0 {
            return Err(CodecError::unsupported(format!("picture size {width}x{height}")));
        }
        Ok(Self {
            format,
            width,
            height,
            frames_out: 0,
        })
    }

    /// Bytes in one packed picture.
    pub fn picture_size(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    fn accept<'a>(&self, frame: &'a Frame) -> CodecResult<&'a VideoFrame> {
        let video = frame
            .as_video()
            .ok_or_else(|| CodecError::unsupported("expected a video frame"))?;
        if video.format != self.format || video.width != self.width || video.height != self.height {
            return Err(CodecError::unsupported(format!(
                "frame is {:?} {}x{}, stream is {:?} {}x{}",
                video.format, video.width, video.height, self.format, self.width, self.height
            )));
        }
        let needed = video.stride * (self.height as usize - 1) + video.row_bytes();
        if video.stride < video.row_bytes() || video.data.len() < needed {
            return Err(CodecError::invalid("picture buffer is smaller than its geometry"));
        }
        Ok(video)
    }
}

impl Transform for RawVideoEncoder {
    fn name(&self) -> &'static str {
        "rawvideo"
    }

    fn transform(
        &mut self,
        frame: Option<&Frame>,
        alloc: &mut dyn PacketAllocator,
    ) -> CodecResult<TransformOutcome> {
        let Some(frame) = frame else {
            return Ok(TransformOutcome::Eof);
        };
        let video = self.accept(frame)?;

        let size = self.picture_size();
        let row = video.row_bytes();
        let mut packet = alloc.alloc_packet(size)?;
        for (y, out) in packet.data[..size].chunks_exact_mut(row).enumerate() {
            out.copy_from_slice(video.row(y));
        }
        packet.truncate(size);

        packet.pts = Some(video.pts.unwrap_or(self.frames_out));
        packet.dts = packet.pts;
        packet.duration = 1;
        packet.key = true;
        self.frames_out += 1;
        Ok(TransformOutcome::Consumed(Some(packet)))
    }

    fn reset(&mut self) {
        self.frames_out = 0;
    }
}
