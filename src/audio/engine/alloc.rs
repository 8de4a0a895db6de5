//! Packet payload allocators.

use std::sync::Arc;

use super::PacketAllocator;
use crate::audio::buffer::BufferPool;
use crate::audio::frame::Packet;
use crate::common::errors::{CodecError, CodecResult};

fn check_limit(size: usize, limit: Option<usize>) -> CodecResult<()> {
    match limit {
        Some(max) if size > max => Err(CodecError::OutOfMemory { requested: size }),
        _ => Ok(()),
    }
}

fn zeroed(mut buf: Vec<u8>, size: usize) -> Packet {
    buf.clear();
    buf.resize(size, 0);
    Packet {
        data: buf,
        ..Packet::default()
    }
}

/// Fresh heap allocation per packet.
#[derive(Debug, Default)]
pub struct HeapAllocator {
    limit: Option<usize>,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse any single payload larger than `limit` bytes.
    pub fn with_limit(limit: usize) -> Self {
        Self { limit: Some(limit) }
    }
}

impl PacketAllocator for HeapAllocator {
    fn get_encode_buffer(&mut self, size: usize) -> CodecResult<Packet> {
        check_limit(size, self.limit)?;
        let mut buf = Vec::new();
        buf.try_reserve_exact(size)
            .map_err(|_| CodecError::OutOfMemory { requested: size })?;
        Ok(zeroed(buf, size))
    }
}

/// Draws payloads from a [`BufferPool`] that the sink refills.
pub struct PooledAllocator {
    pool: Arc<BufferPool>,
    limit: Option<usize>,
}

impl PooledAllocator {
    pub fn new(pool: Arc<BufferPool>) -> Self {
        Self { pool, limit: None }
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn pool(&self) -> &Arc<BufferPool> {
        &self.pool
    }
}

impl PacketAllocator for PooledAllocator {
    fn get_encode_buffer(&mut self, size: usize) -> CodecResult<Packet> {
        check_limit(size, self.limit)?;
        let buf = self
            .pool
            .acquire(size)
            .map_err(|_| CodecError::OutOfMemory { requested: size })?;
        Ok(zeroed(buf, size))
    }
}
