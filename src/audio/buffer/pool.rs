//! Power-of-two aligned byte buffer pool.
//!
//! Sizes are rounded up to the next power of two (minimum 1 024 bytes),
//! pooled in per-size buckets, and evicted after a configurable idle period.
//! A pool is owned per stream (wrapped in an `Arc`) and shared between the
//! packet allocator, which acquires payloads, and the sink, which releases
//! them once written.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::audio::constants::{
    MAX_BUCKET_ENTRIES, MAX_POOL_BYTES, POOL_IDLE_CLEAR_SECS, POOL_MAX_BUFFER, POOL_MIN_BUFFER,
};

// ── Inner state ──────────────────────────────────────────────────────────────

struct PoolInner {
    buckets: HashMap<usize, Vec<Vec<u8>>>,
    total_bytes: usize,
    max_bytes: usize,
    last_activity: Instant,
    last_cleanup: Instant,
    hits: u64,
    misses: u64,
}

impl PoolInner {
    fn new(max_bytes: usize) -> Self {
        let now = Instant::now();
        Self {
            buckets: HashMap::new(),
            total_bytes: 0,
            max_bytes,
            last_activity: now,
            last_cleanup: now,
            hits: 0,
            misses: 0,
        }
    }

    /// Round `size` up to the next power of two, with a floor of 1 024.
    fn aligned_size(size: usize) -> usize {
        size.max(POOL_MIN_BUFFER).next_power_of_two()
    }

    /// Pop a pooled buffer of the aligned bucket size, if one is idle.
    fn take(&mut self, size: usize) -> Option<Vec<u8>> {
        self.last_activity = Instant::now();
        let aligned = Self::aligned_size(size);

        let buf = self.buckets.get_mut(&aligned).and_then(Vec::pop);
        match buf {
            Some(mut buf) => {
                self.total_bytes -= aligned;
                self.hits += 1;
                buf.clear();
                Some(buf)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn release(&mut self, mut buf: Vec<u8>) {
        self.last_activity = Instant::now();
        let size = buf.capacity();

        if !(POOL_MIN_BUFFER..=POOL_MAX_BUFFER).contains(&size) || !size.is_power_of_two() {
            return;
        }
        if self.total_bytes + size > self.max_bytes {
            return;
        }

        let bucket = self.buckets.entry(size).or_default();
        if bucket.len() >= MAX_BUCKET_ENTRIES {
            return; // bucket full, just drop
        }

        buf.clear();
        self.total_bytes += size;
        bucket.push(buf);
    }

    /// Evict all buffers if the pool has been idle for `POOL_IDLE_CLEAR_SECS`.
    fn cleanup(&mut self) {
        if self.total_bytes == 0 {
            return;
        }

        // Rate-limit cleanup checks to every 30 seconds.
        if self.last_cleanup.elapsed() < Duration::from_secs(30) {
            return;
        }
        self.last_cleanup = Instant::now();

        if self.last_activity.elapsed() >= Duration::from_secs(POOL_IDLE_CLEAR_SECS)
            || self.total_bytes > self.max_bytes
        {
            tracing::trace!("byte pool evicted {} idle bytes", self.total_bytes);
            self.buckets.clear();
            self.total_bytes = 0;
        }
    }
}

// ── Public API ───────────────────────────────────────────────────────────────

/// Thread-safe byte buffer pool.
pub struct BufferPool {
    inner: Mutex<PoolInner>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::with_limit(MAX_POOL_BYTES)
    }

    /// A pool that never holds more than `max_bytes` of idle buffers.
    pub fn with_limit(max_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner::new(max_bytes)),
        }
    }

    /// Acquire an empty buffer with capacity for at least `size` bytes.
    ///
    /// A fresh allocation goes through `try_reserve`, so an impossible
    /// request is reported instead of aborting the process.
    pub fn acquire(&self, size: usize) -> Result<Vec<u8>, std::collections::TryReserveError> {
        let pooled = {
            let mut g = self.inner.lock();
            g.cleanup();
            g.take(size)
        };
        if let Some(buf) = pooled {
            return Ok(buf);
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(PoolInner::aligned_size(size))?;
        Ok(buf)
    }

    /// Return a buffer to the pool for reuse.
    pub fn release(&self, buf: Vec<u8>) {
        self.inner.lock().release(buf);
    }

    /// Pool statistics (total bytes, bucket count).
    pub fn stats(&self) -> PoolStats {
        let g = self.inner.lock();
        PoolStats {
            total_bytes: g.total_bytes,
            buckets: g.buckets.len(),
            entries: g.buckets.values().map(|b| b.len()).sum(),
            hits: g.hits,
            misses: g.misses,
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of pool health.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_bytes: usize,
    pub buckets: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}
