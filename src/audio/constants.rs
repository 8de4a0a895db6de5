//! Central constants for the encode pipeline.
//!
//! All magic numbers in `src/audio/**` live here so they can be tuned in one
//! place and remain consistent across modules.

// ── Tempo ─────────────────────────────────────────────────────────────────────

/// Slowest accepted tempo factor.
pub const TEMPO_MIN: f64 = 0.5;

/// Fastest accepted tempo factor.
pub const TEMPO_MAX: f64 = 100.0;

/// The analysis window spans roughly `1 / WINDOW_RATE_DIVISOR` seconds
/// (about 41.7 ms), rounded up to a power of two.
pub const WINDOW_RATE_DIVISOR: u32 = 24;

/// The input ring keeps this many windows of history.
pub const RING_WINDOWS: usize = 3;

// ── Packets ───────────────────────────────────────────────────────────────────

/// Scratch capacity allocated for a packet whose size is not known up front.
pub const MIN_PACKET_SCRATCH: usize = 16_384;

/// Default capacity of the frame and packet channels.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

// ── Buffer pool (byte pool) ───────────────────────────────────────────────────

/// Maximum total bytes held in the byte pool (2 MB).
pub const MAX_POOL_BYTES: usize = 2 * 1_024 * 1_024;

/// Maximum buffers per same-size bucket.
pub const MAX_BUCKET_ENTRIES: usize = 8;

/// Idle duration before the pool is evicted (seconds).
pub const POOL_IDLE_CLEAR_SECS: u64 = 180;

/// Buffers outside `[POOL_MIN_BUFFER, POOL_MAX_BUFFER]` bytes are never pooled.
pub const POOL_MIN_BUFFER: usize = 1_024;
pub const POOL_MAX_BUFFER: usize = 10 * 1_024 * 1_024;
