//! Frame sources.

use std::io::{ErrorKind, Read};

use flume::{Receiver, TryRecvError};
use tracing::debug;

use super::{FrameSource, Pull};
use crate::audio::format::SampleFormat;
use crate::audio::frame::{AudioFrame, Frame};
use crate::common::errors::{CodecError, CodecResult};

/// Frames arriving over a flume channel from another thread.
///
/// An empty channel reads as `Again`; a disconnected, drained one as `Eof`.
pub struct ChannelSource {
    rx: Receiver<Frame>,
    peeked: Option<Frame>,
}

impl ChannelSource {
    pub fn new(rx: Receiver<Frame>) -> Self {
        Self { rx, peeked: None }
    }
}

impl FrameSource for ChannelSource {
    fn get_frame(&mut self) -> CodecResult<Pull<Frame>> {
        if let Some(frame) = self.peeked.take() {
            return Ok(Pull::Ready(frame));
        }
        match self.rx.try_recv() {
            Ok(frame) => Ok(Pull::Ready(frame)),
            Err(TryRecvError::Empty) => Ok(Pull::Again),
            Err(TryRecvError::Disconnected) => Ok(Pull::Eof),
        }
    }

    fn wait(&mut self) -> CodecResult<()> {
        if self.peeked.is_none() {
            // a disconnect surfaces as Eof on the next get_frame
            self.peeked = self.rx.recv().ok();
        }
        Ok(())
    }
}

/// Interleaved little-endian PCM read from any [`Read`] implementation, cut
/// into frames of a fixed number of samples.
pub struct ReaderSource<R> {
    reader: R,
    format: SampleFormat,
    channels: u16,
    sample_rate: u32,
    frame_bytes: usize,
    pts: i64,
    eof: bool,
}

impl<R: Read + Send> ReaderSource<R> {
    pub fn new(
        reader: R,
        format: SampleFormat,
        channels: u16,
        sample_rate: u32,
        frame_size: usize,
    ) -> CodecResult<Self> {
        if channels == 0 || frame_size == 0 {
            return Err(CodecError::invalid(
                "reader source needs at least one channel and one sample per frame",
            ));
        }
        let stride = format.bytes_per_sample() * channels as usize;
        Ok(Self {
            reader,
            format,
            channels,
            sample_rate,
            frame_bytes: frame_size * stride,
            pts: 0,
            eof: false,
        })
    }

    /// Fill `buf` as far as the reader allows; short only at end of input.
    fn fill(&mut self, buf: &mut [u8]) -> CodecResult<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }
}

impl<R: Read + Send> FrameSource for ReaderSource<R> {
    fn get_frame(&mut self) -> CodecResult<Pull<Frame>> {
        if self.eof {
            return Ok(Pull::Eof);
        }

        let mut data = vec![0u8; self.frame_bytes];
        let filled = self.fill(&mut data)?;

        let stride = self.format.bytes_per_sample() * self.channels as usize;
        let samples = filled / stride;
        if filled < self.frame_bytes {
            self.eof = true;
            if filled % stride != 0 {
                debug!("dropping {} trailing bytes of a partial sample", filled % stride);
            }
        }
        if samples == 0 {
            return Ok(Pull::Eof);
        }

        data.truncate(samples * stride);
        let frame = AudioFrame {
            format: self.format,
            channels: self.channels,
            sample_rate: self.sample_rate,
            samples,
            data,
            pts: Some(self.pts),
        };
        self.pts += samples as i64;
        Ok(Pull::Ready(frame.into()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn channel_source_states() {
        let (tx, rx) = flume::bounded(4);
        let mut source = ChannelSource::new(rx);
        assert_eq!(source.get_frame().unwrap(), Pull::Again);

        let frame: Frame = AudioFrame::from_samples(&[1i16, 2], 1, 8_000).into();
        tx.send(frame.clone()).unwrap();
        assert_eq!(source.get_frame().unwrap(), Pull::Ready(frame));

        drop(tx);
        assert_eq!(source.get_frame().unwrap(), Pull::Eof);
        assert_eq!(source.get_frame().unwrap(), Pull::Eof);
    }

    #[test]
    fn channel_source_wait_blocks_for_next_frame() {
        let (tx, rx) = flume::bounded(1);
        let mut source = ChannelSource::new(rx);

        let producer = std::thread::spawn(move || {
            let frame: Frame = AudioFrame::from_samples(&[3.0f32], 1, 8_000).into();
            tx.send(frame).unwrap();
        });

        source.wait().unwrap();
        assert!(source.get_frame().unwrap().is_ready());
        producer.join().unwrap();

        source.wait().unwrap();
        assert_eq!(source.get_frame().unwrap(), Pull::Eof);
    }

    #[test]
    fn reader_source_frames_and_timestamps() {
        let samples: Vec<u8> = (0..10i16).flat_map(|v| v.to_le_bytes()).collect();
        let mut source =
            ReaderSource::new(Cursor::new(samples), SampleFormat::S16, 2, 8_000, 2).unwrap();

        let mut pts = Vec::new();
        let mut total = 0;
        while let Pull::Ready(frame) = source.get_frame().unwrap() {
            let audio = frame.as_audio().unwrap();
            pts.push(audio.pts.unwrap());
            total += audio.samples;
        }
        // 5 stereo samples in frames of 2
        assert_eq!(pts, vec![0, 2, 4]);
        assert_eq!(total, 5);
        assert_eq!(source.get_frame().unwrap(), Pull::Eof);
    }

    #[test]
    fn reader_source_drops_partial_sample() {
        let mut source =
            ReaderSource::new(Cursor::new(vec![1u8, 0, 2]), SampleFormat::S16, 1, 8_000, 4)
                .unwrap();
        let frame = source.get_frame().unwrap().ready().unwrap();
        assert_eq!(frame.as_audio().unwrap().to_samples::<i16>(), Some(vec![1]));
        assert_eq!(source.get_frame().unwrap(), Pull::Eof);
    }
}
