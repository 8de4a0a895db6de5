//! Packet sinks.

use std::io::Write;
use std::sync::Arc;

use flume::Sender;

use super::PacketSink;
use crate::audio::buffer::BufferPool;
use crate::audio::frame::Packet;
use crate::common::errors::{CodecError, CodecResult};

fn check_size(packet: &Packet, max: Option<usize>) -> CodecResult<()> {
    match max {
        Some(max) if packet.size() > max => Err(CodecError::PacketTooLarge {
            size: packet.size(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Hands packets to a consumer thread over a bounded flume channel.
///
/// Back-pressure comes from the channel bound: `write_packet` blocks until
/// there is room, and fails with [`CodecError::SinkClosed`] once the
/// receiver is gone.
pub struct ChannelSink {
    tx: Sender<Packet>,
    max_packet_size: Option<usize>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Packet>) -> Self {
        Self {
            tx,
            max_packet_size: None,
        }
    }

    pub fn with_max_packet_size(mut self, max: Option<usize>) -> Self {
        self.max_packet_size = max;
        self
    }
}

impl PacketSink for ChannelSink {
    fn write_packet(&mut self, packet: Packet) -> CodecResult<()> {
        check_size(&packet, self.max_packet_size)?;
        self.tx.send(packet).map_err(|_| CodecError::SinkClosed)
    }
}

/// Writes packet payloads back to back, returning spent buffers to a pool.
pub struct WriterSink<W> {
    writer: W,
    max_packet_size: Option<usize>,
    pool: Option<Arc<BufferPool>>,
    packets: u64,
    bytes: u64,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            max_packet_size: None,
            pool: None,
            packets: 0,
            bytes: 0,
        }
    }

    pub fn with_max_packet_size(mut self, max: Option<usize>) -> Self {
        self.max_packet_size = max;
        self
    }

    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn packets(&self) -> u64 {
        self.packets
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> PacketSink for WriterSink<W> {
    fn write_packet(&mut self, packet: Packet) -> CodecResult<()> {
        check_size(&packet, self.max_packet_size)?;
        self.writer.write_all(&packet.data)?;
        self.packets += 1;
        self.bytes += packet.size() as u64;

        if let Some(pool) = &self.pool {
            pool.release(packet.into_data());
        }
        Ok(())
    }

    fn finish(&mut self) -> CodecResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every packet in memory.
#[derive(Debug, Default)]
pub struct CollectSink {
    pub packets: Vec<Packet>,
    pub max_packet_size: Option<usize>,
    pub finished: bool,
}

impl CollectSink {
    /// All payloads concatenated.
    pub fn bytes(&self) -> Vec<u8> {
        self.packets.iter().flat_map(|p| p.data.iter().copied()).collect()
    }
}

impl PacketSink for CollectSink {
    fn write_packet(&mut self, packet: Packet) -> CodecResult<()> {
        check_size(&packet, self.max_packet_size)?;
        self.packets.push(packet);
        Ok(())
    }

    fn finish(&mut self) -> CodecResult<()> {
        self.finished = true;
        Ok(())
    }
}
