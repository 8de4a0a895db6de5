//! WSOLA tempo scaling as an encode transform.
//!
//! Input frames are decoded into the stream's native sample type and fed to
//! a [`TempoFilter`]. Output is collected into a buffer sized
//! `round(n_in / tempo)` samples from the frame that opened it; a packet
//! leaves whenever that buffer fills. After end of input each flush pass
//! that yields samples becomes one packet. Packet timestamps count output
//! samples.

use tracing::debug;

use super::AudioParams;
use crate::audio::engine::{Capabilities, PacketAllocator, Transform, TransformOutcome};
use crate::audio::filters::tempo::{TempoFilter, TempoState, TempoStats};
use crate::audio::format::SampleFormat;
use crate::audio::frame::{AudioFrame, Frame, Packet};
use crate::audio::sample::{Sample, encode_le};
use crate::common::errors::{CodecError, CodecResult};

/// Per-sample-type stream state.
struct TempoStream<S: Sample> {
    filter: TempoFilter<S>,
    /// Decoded samples of the frame being consumed.
    input: Vec<S>,
    input_pos: usize,
    /// Output buffer size (interleaved values) of the frame being consumed.
    frame_limit: usize,
    pending: Vec<S>,
    /// Capacity of the open output buffer, 0 when none is open.
    pending_limit: usize,
}

impl<S: Sample> TempoStream<S> {
    fn new(params: &AudioParams, tempo: f64) -> CodecResult<Self> {
        Ok(Self {
            filter: TempoFilter::new(params.sample_rate, params.channels as usize, tempo)?,
            input: Vec::new(),
            input_pos: 0,
            frame_limit: 0,
            pending: Vec::new(),
            pending_limit: 0,
        })
    }

    /// Feed the frame (decoding it on first sight) and report any full
    /// output buffer, plus whether the frame is used up.
    fn feed(&mut self, frame: &AudioFrame) -> (Option<Vec<S>>, bool) {
        let ch = self.filter.channels();
        if self.input.is_empty() {
            frame.decode_into(&mut self.input);
            self.input_pos = 0;
            let n_out = (frame.samples as f64 / self.filter.tempo()).round() as usize;
            self.frame_limit = n_out.max(1) * ch;
        }

        loop {
            if self.pending_limit == 0 {
                self.pending_limit = self.frame_limit;
            }

            let mut src = &self.input[self.input_pos..];
            self.filter.apply(&mut src, &mut self.pending, self.pending_limit);
            self.input_pos = self.input.len() - src.len();

            let done = src.is_empty();
            let full = self.pending.len() >= self.pending_limit;
            if done {
                self.input.clear();
                self.input_pos = 0;
            }

            if full {
                self.pending_limit = 0;
                return (Some(std::mem::take(&mut self.pending)), done);
            }
            if done {
                return (None, true);
            }
        }
    }

    /// One flush pass. Returns the samples it produced and whether the
    /// filter is fully drained.
    fn drain(&mut self) -> (Option<Vec<S>>, bool) {
        if self.pending_limit == 0 {
            self.pending_limit = self.filter.ring_capacity() * self.filter.channels();
        }
        let complete = self.filter.flush(&mut self.pending, self.pending_limit);

        if self.pending.is_empty() {
            return (None, complete);
        }
        self.pending_limit = 0;
        (Some(std::mem::take(&mut self.pending)), complete)
    }

    fn reset(&mut self) {
        self.filter.reset();
        self.input.clear();
        self.input_pos = 0;
        self.frame_limit = 0;
        self.pending.clear();
        self.pending_limit = 0;
    }
}

enum Kernel {
    U8(TempoStream<u8>),
    S16(TempoStream<i16>),
    S32(TempoStream<i32>),
    F32(TempoStream<f32>),
    F64(TempoStream<f64>),
}

/// Evaluate `$body` against whichever stream the kernel holds.
macro_rules! with_stream {
    ($kernel:expr, $s:ident => $body:expr) => {
        match $kernel {
            Kernel::U8($s) => $body,
            Kernel::S16($s) => $body,
            Kernel::S32($s) => $body,
            Kernel::F32($s) => $body,
            Kernel::F64($s) => $body,
        }
    };
}

/// A chunk of output ready to be packed.
enum Chunk {
    None,
    Ready(Vec<u8>, usize),
}

fn pack<S: Sample>(samples: Option<Vec<S>>, channels: usize) -> Chunk {
    match samples {
        Some(samples) => {
            let mut bytes = vec![0u8; samples.len() * S::FORMAT.bytes_per_sample()];
            encode_le(&samples, &mut bytes);
            Chunk::Ready(bytes, samples.len() / channels)
        }
        None => Chunk::None,
    }
}

pub struct TempoEncoder {
    params: AudioParams,
    kernel: Kernel,
    samples_out: i64,
    drained: bool,
}

impl TempoEncoder {
    pub fn new(params: AudioParams, tempo: f64) -> CodecResult<Self> {
        params.validate()?;
        let kernel = match params.format {
            SampleFormat::U8 => Kernel::U8(TempoStream::new(&params, tempo)?),
            SampleFormat::S16 => Kernel::S16(TempoStream::new(&params, tempo)?),
            SampleFormat::S32 => Kernel::S32(TempoStream::new(&params, tempo)?),
            SampleFormat::F32 => Kernel::F32(TempoStream::new(&params, tempo)?),
            SampleFormat::F64 => Kernel::F64(TempoStream::new(&params, tempo)?),
        };
        Ok(Self {
            params,
            kernel,
            samples_out: 0,
            drained: false,
        })
    }

    pub fn tempo(&self) -> f64 {
        with_stream!(&self.kernel, s => s.filter.tempo())
    }

    pub fn window(&self) -> usize {
        with_stream!(&self.kernel, s => s.filter.window())
    }

    pub fn stats(&self) -> TempoStats {
        with_stream!(&self.kernel, s => s.filter.stats())
    }

    pub fn set_tempo(&mut self, tempo: f64) -> CodecResult<()> {
        with_stream!(&mut self.kernel, s => s.filter.set_tempo(tempo))
    }

    fn packet(&mut self, bytes: Vec<u8>, samples: usize, alloc: &mut dyn PacketAllocator) -> CodecResult<Packet> {
        let mut packet = alloc.get_encode_buffer(bytes.len())?;
        packet.data.copy_from_slice(&bytes);
        packet.pts = Some(self.samples_out);
        packet.dts = packet.pts;
        packet.duration = samples as i64;
        packet.key = true;
        self.samples_out += samples as i64;
        Ok(packet)
    }
}

impl Transform for TempoEncoder {
    fn name(&self) -> &'static str {
        "tempo"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { delay: true }
    }

    fn transform(
        &mut self,
        frame: Option<&Frame>,
        alloc: &mut dyn PacketAllocator,
    ) -> CodecResult<TransformOutcome> {
        let ch = self.params.channels as usize;

        let Some(frame) = frame else {
            loop {
                if self.drained {
                    return Ok(TransformOutcome::Eof);
                }
                let (chunk, complete) = with_stream!(&mut self.kernel, s => {
                    let (out, complete) = s.drain();
                    (pack(out, ch), complete)
                });
                if complete {
                    debug!("tempo drained after {} output samples", self.samples_out);
                    self.drained = true;
                }
                if let Chunk::Ready(bytes, samples) = chunk {
                    let packet = self.packet(bytes, samples, alloc)?;
                    return Ok(TransformOutcome::Consumed(Some(packet)));
                }
            }
        };

        let audio = self.params.accept(frame)?;
        let flushing = with_stream!(&self.kernel, s => s.filter.state() == TempoState::FlushOutput);
        if flushing {
            return Err(CodecError::invalid(
                "tempo stream already drained; reset before sending more frames",
            ));
        }
        let (chunk, done) = with_stream!(&mut self.kernel, s => {
            let (out, done) = s.feed(audio);
            (pack(out, ch), done)
        });

        match (chunk, done) {
            (Chunk::Ready(bytes, samples), true) => {
                Ok(TransformOutcome::Consumed(Some(self.packet(bytes, samples, alloc)?)))
            }
            (Chunk::Ready(bytes, samples), false) => {
                Ok(TransformOutcome::Partial(self.packet(bytes, samples, alloc)?))
            }
            (Chunk::None, _) => Ok(TransformOutcome::Consumed(None)),
        }
    }

    fn command(&mut self, name: &str, arg: &str) -> CodecResult<()> {
        match name {
            "tempo" => {
                let tempo: f64 = arg
                    .trim()
                    .parse()
                    .map_err(|_| CodecError::invalid(format!("invalid tempo value '{arg}'")))?;
                self.set_tempo(tempo)
            }
            other => Err(CodecError::UnknownCommand(other.to_string())),
        }
    }

    fn reset(&mut self) {
        with_stream!(&mut self.kernel, s => s.reset());
        self.samples_out = 0;
        self.drained = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::engine::{CollectSink, EncodeDriver, FrameSource, HeapAllocator, Pull};

    struct Frames(std::vec::IntoIter<Frame>);

    impl FrameSource for Frames {
        fn get_frame(&mut self) -> CodecResult<Pull<Frame>> {
            Ok(self.0.next().map_or(Pull::Eof, Pull::Ready))
        }
    }

    fn frames<S: Sample>(samples: &[S], channels: u16, rate: u32, frame: usize) -> Frames {
        let list: Vec<Frame> = samples
            .chunks(frame * channels as usize)
            .map(|c| AudioFrame::from_samples(c, channels, rate).into())
            .collect();
        Frames(list.into_iter())
    }

    fn encode<S: Sample>(
        samples: &[S],
        channels: u16,
        rate: u32,
        tempo: f64,
    ) -> (CollectSink, TempoEncoderProbe) {
        let params = AudioParams::new(S::FORMAT, channels, rate);
        let encoder = TempoEncoder::new(params, tempo).unwrap();
        let window = encoder.window();
        let mut driver = EncodeDriver::new(
            Box::new(frames(samples, channels, rate, 1024)),
            Box::new(encoder),
            Box::new(HeapAllocator::new()),
        );
        let mut sink = CollectSink::default();
        let stats = driver.run(&mut sink).unwrap();
        (
            sink,
            TempoEncoderProbe {
                window,
                units_consumed: stats.units_consumed,
            },
        )
    }

    struct TempoEncoderProbe {
        window: usize,
        units_consumed: u64,
    }

    #[test]
    fn double_tempo_silence_through_driver() {
        let (sink, probe) = encode(&[0.0f32; 1000], 1, 4_000, 2.0);
        let out: Vec<f32> = crate::audio::frame::AudioFrame {
            format: SampleFormat::F32,
            channels: 1,
            sample_rate: 4_000,
            samples: sink.bytes().len() / 4,
            data: sink.bytes(),
            pts: None,
        }
        .to_samples()
        .unwrap();

        assert_eq!(probe.units_consumed, 1000);
        assert!((out.len() as i64 - 500).abs() <= probe.window as i64);
        assert!(out.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn timestamps_count_output_samples() {
        let input: Vec<i16> = (0..20_000).map(|i| ((i % 100) as i16 - 50) * 200).collect();
        let (sink, _) = encode(&input, 2, 8_000, 1.5);

        let mut expected = 0;
        for packet in &sink.packets {
            assert_eq!(packet.pts, Some(expected));
            assert_eq!(packet.size() as i64, packet.duration * 4);
            assert!(packet.key);
            expected += packet.duration;
        }
        assert!((expected - 6_667).abs() <= 512, "{expected}");
    }

    #[test]
    fn large_frame_splits_into_partials() {
        let params = AudioParams::new(SampleFormat::F32, 1, 8_000);
        let mut encoder = TempoEncoder::new(params, 0.5).unwrap();
        let mut alloc = HeapAllocator::new();
        let input: Vec<f32> = (0..4096).map(|i| (i as f32 * 0.05).sin()).collect();
        let frame: Frame = AudioFrame::from_samples(&input, 1, 8_000).into();

        let mut partials = 0;
        loop {
            match encoder.transform(Some(&frame), &mut alloc).unwrap() {
                TransformOutcome::Partial(_) => partials += 1,
                TransformOutcome::Consumed(_) => break,
                other => panic!("unexpected {other:?}"),
            }
            assert!(partials < 16);
        }
        // 4096 samples at half speed fill the 8192-sample buffer at most once
        assert!(partials <= 1);
    }

    #[test]
    fn mismatched_frames_are_rejected() {
        let params = AudioParams::new(SampleFormat::S16, 2, 48_000);
        let mut encoder = TempoEncoder::new(params, 1.0).unwrap();
        let mut alloc = HeapAllocator::new();
        let frame: Frame = AudioFrame::from_samples(&[0.0f32; 8], 2, 48_000).into();
        assert!(matches!(
            encoder.transform(Some(&frame), &mut alloc),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn tempo_command() {
        let params = AudioParams::new(SampleFormat::F32, 1, 8_000);
        let mut encoder = TempoEncoder::new(params, 1.0).unwrap();

        encoder.command("tempo", " 1.25 ").unwrap();
        assert_eq!(encoder.tempo(), 1.25);
        assert!(matches!(
            encoder.command("tempo", "fast"),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(matches!(
            encoder.command("tempo", "200"),
            Err(CodecError::InvalidArgument(_))
        ));
        assert!(matches!(
            encoder.command("pitch", "1.0"),
            Err(CodecError::UnknownCommand(_))
        ));
        assert_eq!(encoder.tempo(), 1.25);
    }

    #[test]
    fn eof_repeats_after_drain() {
        let params = AudioParams::new(SampleFormat::U8, 1, 8_000);
        let mut encoder = TempoEncoder::new(params, 1.0).unwrap();
        let mut alloc = HeapAllocator::new();

        let frame: Frame = AudioFrame::from_samples(&[128u8; 300], 1, 8_000).into();
        while let TransformOutcome::Partial(_) = encoder.transform(Some(&frame), &mut alloc).unwrap() {}

        let mut drained = 0;
        while let TransformOutcome::Consumed(Some(p)) = encoder.transform(None, &mut alloc).unwrap() {
            drained += p.duration;
        }
        assert!(drained > 0);
        assert_eq!(encoder.transform(None, &mut alloc).unwrap(), TransformOutcome::Eof);

        assert!(matches!(
            encoder.transform(Some(&frame), &mut alloc),
            Err(CodecError::InvalidArgument(_))
        ));

        encoder.reset();
        assert!(matches!(
            encoder.transform(Some(&frame), &mut alloc).unwrap(),
            TransformOutcome::Consumed(_)
        ));
    }

    #[test]
    fn tempo_command_mid_stream() {
        let input: Vec<f32> = (0..16_000)
            .map(|i| (i as f32 * 2.0 * std::f32::consts::PI * 330.0 / 8_000.0).sin() * 0.5)
            .collect();
        let params = AudioParams::new(SampleFormat::F32, 1, 8_000);
        let encoder = TempoEncoder::new(params, 1.0).unwrap();
        let window = encoder.window() as i64;
        let mut driver = EncodeDriver::new(
            Box::new(frames(&input, 1, 8_000, 1000)),
            Box::new(encoder),
            Box::new(HeapAllocator::new()),
        );

        let mut packets = Vec::new();
        let mut switched = false;
        loop {
            if !switched && driver.stats().units_consumed >= 8_000 {
                driver.command("tempo", "2.0").unwrap();
                switched = true;
            }
            match driver.encode_step().unwrap() {
                Pull::Ready(packet) => packets.push(packet),
                Pull::Again => panic!("in-memory source never stalls"),
                Pull::Eof => break,
            }
        }
        assert!(switched);
        assert!(matches!(
            driver.command("tempo", "0.1"),
            Err(CodecError::InvalidArgument(_))
        ));

        let mut next = 0;
        for packet in &packets {
            assert_eq!(packet.pts, Some(next));
            next += packet.duration;
        }
        // 8000 samples at unit tempo, then 8000 at double tempo
        assert!((next - 12_000).abs() <= 2 * window, "{next}");
        assert_eq!(driver.stats().units_consumed, 16_000);
    }
}
