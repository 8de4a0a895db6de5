//! The encode pull loop.
//!
//! Each [`EncodeDriver::encode_step`] stages at most one frame, offers it to
//! the transform and reacts to the outcome:
//!
//! | Outcome | Staged frame | Step returns |
//! |---|---|---|
//! | `Consumed(Some(p))` | cleared | `Ready(p)` |
//! | `Consumed(None)` | cleared | keeps pulling |
//! | `Again` | kept | `Again` |
//! | `Partial(p)` | kept | `Ready(p)` |
//! | `Eof` | cleared | `Eof`, now and forever |
//!
//! Source EOF does not end the stream: the transform is then offered `None`
//! until it reports `Eof` itself, so delayed output is never lost.

use tracing::{debug, trace};

use super::{FrameSource, PacketAllocator, PacketSink, Pull, Transform, TransformOutcome};
use crate::audio::frame::{Frame, Packet};
use crate::common::errors::CodecResult;

/// Running totals for one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Frames pulled from the source.
    pub frames_in: u64,
    /// Frames the transform finished with.
    pub frames_consumed: u64,
    /// Samples (or pictures) in consumed frames.
    pub units_consumed: u64,
    pub packets_out: u64,
    pub bytes_out: u64,
}

pub struct EncodeDriver {
    source: Box<dyn FrameSource>,
    transform: Box<dyn Transform>,
    allocator: Box<dyn PacketAllocator>,
    staged: Option<Frame>,
    source_eof: bool,
    finished: bool,
    stats: DriverStats,
}

impl EncodeDriver {
    pub fn new(
        source: Box<dyn FrameSource>,
        transform: Box<dyn Transform>,
        allocator: Box<dyn PacketAllocator>,
    ) -> Self {
        debug!(
            "encode driver: transform '{}' ({:?})",
            transform.name(),
            transform.capabilities()
        );
        Self {
            source,
            transform,
            allocator,
            staged: None,
            source_eof: false,
            finished: false,
            stats: DriverStats::default(),
        }
    }

    pub fn stats(&self) -> DriverStats {
        self.stats
    }

    /// `true` while a frame is waiting to be (re)offered to the transform.
    pub fn has_staged_frame(&self) -> bool {
        self.staged.is_some()
    }

    pub fn is_draining(&self) -> bool {
        self.source_eof
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Forward a runtime command to the transform.
    pub fn command(&mut self, name: &str, arg: &str) -> CodecResult<()> {
        self.transform.command(name, arg)
    }

    /// Advance until a packet is ready, the source or transform asks to be
    /// retried, or the stream is over.
    pub fn encode_step(&mut self) -> CodecResult<Pull<Packet>> {
        if self.finished {
            return Ok(Pull::Eof);
        }

        loop {
            if self.staged.is_none() && !self.source_eof {
                match self.source.get_frame()? {
                    Pull::Ready(frame) => {
                        self.stats.frames_in += 1;
                        self.staged = Some(frame);
                    }
                    Pull::Again => return Ok(Pull::Again),
                    Pull::Eof => {
                        debug!(
                            "source exhausted after {} frames, draining '{}'",
                            self.stats.frames_in,
                            self.transform.name()
                        );
                        self.source_eof = true;
                    }
                }
            }

            let outcome = self
                .transform
                .transform(self.staged.as_ref(), self.allocator.as_mut())?;

            match outcome {
                TransformOutcome::Consumed(packet) => {
                    if let Some(frame) = self.staged.take() {
                        self.stats.frames_consumed += 1;
                        self.stats.units_consumed += frame.units();
                    }
                    if let Some(packet) = packet {
                        return Ok(Pull::Ready(self.record(packet)));
                    }
                }
                TransformOutcome::Again => return Ok(Pull::Again),
                TransformOutcome::Partial(packet) => {
                    return Ok(Pull::Ready(self.record(packet)));
                }
                TransformOutcome::Eof => {
                    self.staged = None;
                    self.finished = true;
                    debug!(
                        "'{}' drained: {} packets, {} bytes",
                        self.transform.name(),
                        self.stats.packets_out,
                        self.stats.bytes_out
                    );
                    return Ok(Pull::Eof);
                }
            }
        }
    }

    /// Drive the stream to completion, delivering every packet to `sink`.
    ///
    /// Blocks on the source whenever it has nothing ready.
    pub fn run(&mut self, sink: &mut dyn PacketSink) -> CodecResult<DriverStats> {
        loop {
            match self.encode_step()? {
                Pull::Ready(packet) => sink.write_packet(packet)?,
                Pull::Again => {
                    if self.staged.is_none() {
                        self.source.wait()?;
                    } else {
                        std::thread::yield_now();
                    }
                }
                Pull::Eof => break,
            }
        }
        sink.finish()?;
        Ok(self.stats)
    }

    fn record(&mut self, packet: Packet) -> Packet {
        self.stats.packets_out += 1;
        self.stats.bytes_out += packet.size() as u64;
        trace!(
            "packet #{} pts={:?} size={}",
            self.stats.packets_out,
            packet.pts,
            packet.size()
        );
        packet
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::audio::engine::{Capabilities, CollectSink, HeapAllocator};
    use crate::audio::frame::AudioFrame;
    use crate::common::errors::CodecError;

    fn frame(value: i16, samples: usize) -> Frame {
        AudioFrame::from_samples(&vec![value; samples], 1, 8_000).into()
    }

    /// Replays a script of source responses, then reports EOF forever.
    struct ScriptSource {
        script: VecDeque<Pull<Frame>>,
    }

    impl ScriptSource {
        fn new(script: Vec<Pull<Frame>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl FrameSource for ScriptSource {
        fn get_frame(&mut self) -> CodecResult<Pull<Frame>> {
            Ok(self.script.pop_front().unwrap_or(Pull::Eof))
        }
    }

    /// One packet per frame holding the frame's first byte.
    struct Passthrough;

    impl Transform for Passthrough {
        fn name(&self) -> &'static str {
            "passthrough"
        }

        fn transform(
            &mut self,
            frame: Option<&Frame>,
            alloc: &mut dyn PacketAllocator,
        ) -> CodecResult<TransformOutcome> {
            let Some(frame) = frame else {
                return Ok(TransformOutcome::Eof);
            };
            let mut packet = alloc.get_encode_buffer(1)?;
            packet.data[0] = frame.as_audio().map_or(0, |f| f.data[0]);
            packet.pts = frame.pts();
            Ok(TransformOutcome::Consumed(Some(packet)))
        }
    }

    /// Emits each frame one step late, like an encoder with lookahead.
    #[derive(Default)]
    struct OneFrameDelay {
        held: Option<u8>,
    }

    impl Transform for OneFrameDelay {
        fn name(&self) -> &'static str {
            "delay"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities { delay: true }
        }

        fn transform(
            &mut self,
            frame: Option<&Frame>,
            alloc: &mut dyn PacketAllocator,
        ) -> CodecResult<TransformOutcome> {
            let incoming = frame.and_then(Frame::as_audio).map(|f| f.data[0]);
            let out = match (frame, self.held.take()) {
                (None, None) => return Ok(TransformOutcome::Eof),
                (_, held) => held,
            };
            self.held = incoming;

            let packet = match out {
                Some(byte) => {
                    let mut packet = alloc.get_encode_buffer(1)?;
                    packet.data[0] = byte;
                    Some(packet)
                }
                None => None,
            };
            Ok(TransformOutcome::Consumed(packet))
        }
    }

    /// Refuses each frame once before taking it.
    #[derive(Default)]
    struct Busy {
        refused: bool,
    }

    impl Transform for Busy {
        fn name(&self) -> &'static str {
            "busy"
        }

        fn transform(
            &mut self,
            frame: Option<&Frame>,
            alloc: &mut dyn PacketAllocator,
        ) -> CodecResult<TransformOutcome> {
            if frame.is_none() {
                return Ok(TransformOutcome::Eof);
            }
            if !self.refused {
                self.refused = true;
                return Ok(TransformOutcome::Again);
            }
            self.refused = false;
            Ok(TransformOutcome::Consumed(Some(alloc.get_encode_buffer(2)?)))
        }
    }

    /// Splits every frame into two packets.
    #[derive(Default)]
    struct Splitter {
        half_done: bool,
    }

    impl Transform for Splitter {
        fn name(&self) -> &'static str {
            "splitter"
        }

        fn transform(
            &mut self,
            frame: Option<&Frame>,
            alloc: &mut dyn PacketAllocator,
        ) -> CodecResult<TransformOutcome> {
            if frame.is_none() {
                return Ok(TransformOutcome::Eof);
            }
            let packet = alloc.get_encode_buffer(4)?;
            if self.half_done {
                self.half_done = false;
                Ok(TransformOutcome::Consumed(Some(packet)))
            } else {
                self.half_done = true;
                Ok(TransformOutcome::Partial(packet))
            }
        }
    }

    fn driver(source: ScriptSource, transform: Box<dyn Transform>) -> EncodeDriver {
        EncodeDriver::new(Box::new(source), transform, Box::new(HeapAllocator::new()))
    }

    #[test]
    fn again_from_source_is_retried_without_state_change() {
        let source = ScriptSource::new(vec![
            Pull::Again,
            Pull::Again,
            Pull::Again,
            Pull::Ready(frame(7, 10)),
        ]);
        let mut driver = driver(source, Box::new(Passthrough));

        for _ in 0..3 {
            assert_eq!(driver.encode_step().unwrap(), Pull::Again);
            assert_eq!(driver.stats(), DriverStats::default());
            assert!(!driver.has_staged_frame());
        }

        let packet = driver.encode_step().unwrap().ready().unwrap();
        assert_eq!(packet.data, vec![7]);
        assert_eq!(driver.encode_step().unwrap(), Pull::Eof);
    }

    #[test]
    fn delayed_transform_flushes_one_packet_after_source_eof() {
        let source = ScriptSource::new(vec![
            Pull::Ready(frame(1, 4)),
            Pull::Ready(frame(2, 4)),
            Pull::Ready(frame(3, 4)),
        ]);
        let mut driver = driver(source, Box::new(OneFrameDelay::default()));

        let first = driver.encode_step().unwrap().ready().unwrap();
        let second = driver.encode_step().unwrap().ready().unwrap();
        assert_eq!((first.data[0], second.data[0]), (1, 2));
        assert!(!driver.is_draining());

        // the third frame's packet only leaves once the source has ended
        let tail = driver.encode_step().unwrap().ready().unwrap();
        assert_eq!(tail.data, vec![3]);
        assert!(driver.is_draining());
        assert_eq!(driver.encode_step().unwrap(), Pull::Eof);
        assert_eq!(driver.encode_step().unwrap(), Pull::Eof);
    }

    #[test]
    fn transform_again_keeps_the_frame() {
        let source = ScriptSource::new(vec![Pull::Ready(frame(5, 3))]);
        let mut driver = driver(source, Box::new(Busy::default()));

        assert_eq!(driver.encode_step().unwrap(), Pull::Again);
        assert!(driver.has_staged_frame());
        let stats = driver.stats();

        assert_eq!(driver.encode_step().unwrap(), Pull::Ready(Packet {
            data: vec![0, 0],
            ..Packet::default()
        }));
        assert_eq!(stats.frames_in, 1);
        assert_eq!(driver.stats().frames_consumed, 1);
        assert_eq!(driver.stats().units_consumed, 3);
    }

    #[test]
    fn partial_redelivers_the_same_frame() {
        let source = ScriptSource::new(vec![Pull::Ready(frame(1, 2)), Pull::Ready(frame(2, 2))]);
        let mut driver = driver(source, Box::new(Splitter::default()));

        let mut packets = 0;
        while let Pull::Ready(_) = driver.encode_step().unwrap() {
            packets += 1;
        }
        assert_eq!(packets, 4);
        let stats = driver.stats();
        assert_eq!(stats.frames_in, 2);
        assert_eq!(stats.frames_consumed, 2);
        assert_eq!(stats.bytes_out, 16);
    }

    #[test]
    fn every_pulled_sample_is_consumed() {
        let sizes = [5usize, 17, 1, 64, 9];
        let source = ScriptSource::new(
            sizes
                .iter()
                .flat_map(|&n| [Pull::Again, Pull::Ready(frame(1, n))])
                .collect(),
        );
        let mut driver = driver(source, Box::new(OneFrameDelay::default()));
        let mut sink = CollectSink::default();

        let stats = driver.run(&mut sink).unwrap();
        assert_eq!(stats.units_consumed, sizes.iter().sum::<usize>() as u64);
        assert_eq!(stats.frames_consumed, sizes.len() as u64);
        assert_eq!(sink.packets.len(), sizes.len());
        assert!(sink.finished);
    }

    #[test]
    fn source_errors_propagate() {
        struct Broken;
        impl FrameSource for Broken {
            fn get_frame(&mut self) -> CodecResult<Pull<Frame>> {
                Err(CodecError::unsupported("broken"))
            }
        }

        let mut driver = EncodeDriver::new(
            Box::new(Broken),
            Box::new(Passthrough),
            Box::new(HeapAllocator::new()),
        );
        assert!(matches!(driver.encode_step(), Err(CodecError::Unsupported(_))));
        assert!(!driver.is_finished());
    }

    #[test]
    fn allocation_failure_propagates() {
        let source = ScriptSource::new(vec![Pull::Ready(frame(1, 1))]);
        let mut driver = EncodeDriver::new(
            Box::new(source),
            Box::new(Busy { refused: true }),
            Box::new(HeapAllocator::with_limit(1)),
        );
        assert!(matches!(
            driver.encode_step(),
            Err(CodecError::OutOfMemory { requested: 2 })
        ));
    }

    #[test]
    fn unknown_commands_are_rejected() {
        let mut driver = driver(ScriptSource::new(vec![]), Box::new(Passthrough));
        assert!(matches!(
            driver.command("volume", "2"),
            Err(CodecError::UnknownCommand(_))
        ));
    }
}
