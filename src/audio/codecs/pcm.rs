//! PCM repacketizer.
//!
//! Re-cuts an interleaved PCM stream into packets of exactly
//! `packet_samples` samples per channel, converting the sample format on the
//! way through the normalized `[-1.0, 1.0]` domain. The short remainder is
//! emitted on drain.

use super::AudioParams;
use crate::audio::engine::{Capabilities, PacketAllocator, Transform, TransformOutcome};
use crate::audio::format::SampleFormat;
use crate::audio::frame::{AudioFrame, Frame, Packet};
use crate::audio::sample::Sample;
use crate::common::errors::{CodecError, CodecResult};

fn to_unit<S: Sample>(frame: &AudioFrame, out: &mut Vec<f64>) {
    let mut samples: Vec<S> = Vec::new();
    frame.decode_into(&mut samples);
    out.extend(samples.into_iter().map(Sample::to_unit));
}

fn write_unit<S: Sample>(values: &[f64], out: &mut [u8]) {
    let width = S::FORMAT.bytes_per_sample();
    for (value, chunk) in values.iter().zip(out.chunks_exact_mut(width)) {
        S::from_unit(*value).write_le(chunk);
    }
}

pub struct PcmEncoder {
    params: AudioParams,
    output: SampleFormat,
    packet_samples: usize,
    fifo: Vec<f64>,
    samples_out: i64,
}

impl PcmEncoder {
    pub fn new(params: AudioParams, output: SampleFormat, packet_samples: usize) -> CodecResult<Self> {
        params.validate()?;
        if packet_samples == 0 {
            return Err(CodecError::invalid("packet size must be at least one sample"));
        }
        Ok(Self {
            params,
            output,
            packet_samples,
            fifo: Vec::new(),
            samples_out: 0,
        })
    }

    pub fn output_format(&self) -> SampleFormat {
        self.output
    }

    /// Samples per channel waiting for a full packet.
    pub fn buffered(&self) -> usize {
        self.fifo.len() / self.params.channels as usize
    }

    fn push(&mut self, frame: &AudioFrame) {
        match frame.format {
            SampleFormat::U8 => to_unit::<u8>(frame, &mut self.fifo),
            SampleFormat::S16 => to_unit::<i16>(frame, &mut self.fifo),
            SampleFormat::S32 => to_unit::<i32>(frame, &mut self.fifo),
            SampleFormat::F32 => to_unit::<f32>(frame, &mut self.fifo),
            SampleFormat::F64 => to_unit::<f64>(frame, &mut self.fifo),
        }
    }

    /// Pack the first `samples` per-channel samples of the fifo.
    fn pop(&mut self, samples: usize, alloc: &mut dyn PacketAllocator) -> CodecResult<Packet> {
        let values = samples * self.params.channels as usize;
        let mut packet = alloc.get_encode_buffer(values * self.output.bytes_per_sample())?;

        let chunk = &self.fifo[..values];
        match self.output {
            SampleFormat::U8 => write_unit::<u8>(chunk, &mut packet.data),
            SampleFormat::S16 => write_unit::<i16>(chunk, &mut packet.data),
            SampleFormat::S32 => write_unit::<i32>(chunk, &mut packet.data),
            SampleFormat::F32 => write_unit::<f32>(chunk, &mut packet.data),
            SampleFormat::F64 => write_unit::<f64>(chunk, &mut packet.data),
        }
        self.fifo.drain(..values);

        packet.pts = Some(self.samples_out);
        packet.dts = packet.pts;
        packet.duration = samples as i64;
        packet.key = true;
        self.samples_out += samples as i64;
        Ok(packet)
    }
}

impl Transform for PcmEncoder {
    fn name(&self) -> &'static str {
        "pcm"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities { delay: true }
    }

    fn transform(
        &mut self,
        frame: Option<&Frame>,
        alloc: &mut dyn PacketAllocator,
    ) -> CodecResult<TransformOutcome> {
        let Some(frame) = frame else {
            let left = self.buffered();
            if left == 0 {
                return Ok(TransformOutcome::Eof);
            }
            let packet = self.pop(left.min(self.packet_samples), alloc)?;
            return Ok(TransformOutcome::Consumed(Some(packet)));
        };

        let audio = self.params.accept(frame)?;

        // emit what is already buffered before taking more input
        if self.buffered() >= self.packet_samples {
            return Ok(TransformOutcome::Partial(self.pop(self.packet_samples, alloc)?));
        }

        self.push(audio);
        if self.buffered() >= self.packet_samples {
            let packet = self.pop(self.packet_samples, alloc)?;
            return Ok(TransformOutcome::Consumed(Some(packet)));
        }
        Ok(TransformOutcome::Consumed(None))
    }

    fn reset(&mut self) {
        self.fifo.clear();
        self.samples_out = 0;
    }
}
