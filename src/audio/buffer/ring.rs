//! Fixed-capacity circular store of interleaved samples.
//!
//! The ring keeps the most recent `capacity` multi-channel samples of a
//! stream together with the absolute count ever pushed, so a reader can
//! address history by absolute input position. Writes never fail: once the
//! ring is full the oldest samples are overwritten.

use crate::audio::buffer::try_vec;
use crate::audio::sample::Sample;
use crate::common::errors::CodecResult;

pub struct SampleRing<S> {
    buf: Vec<S>,
    channels: usize,
    capacity: usize,
    head: usize,
    tail: usize,
    size: usize,
    /// Absolute number of multi-channel samples ever pushed.
    position: i64,
}

impl<S: Sample> SampleRing<S> {
    /// Create a ring holding `capacity` samples of `channels` channels each.
    pub fn new(capacity: usize, channels: usize) -> CodecResult<Self> {
        Ok(Self {
            buf: try_vec(capacity * channels, S::default())?,
            channels,
            capacity,
            head: 0,
            tail: 0,
            size: 0,
            position: 0,
        })
    }

    /// Multi-channel samples currently retained.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Absolute input position one past the newest retained sample.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Absolute input position of the oldest retained sample.
    pub fn first_retained(&self) -> i64 {
        self.position - self.size as i64
    }

    /// Append interleaved samples, evicting the oldest once full.
    ///
    /// A trailing partial multi-channel sample is ignored. Returns the number
    /// of multi-channel samples appended.
    pub fn push(&mut self, samples: &[S]) -> usize {
        let ch = self.channels;
        let count = samples.len() / ch;
        if count == 0 || self.capacity == 0 {
            return 0;
        }

        // only the newest `capacity` samples can survive the write
        let skip = count.saturating_sub(self.capacity);
        let mut src = &samples[skip * ch..count * ch];
        self.tail = (self.tail + skip) % self.capacity;

        while !src.is_empty() {
            let n = (src.len() / ch).min(self.capacity - self.tail);
            let start = self.tail * ch;
            self.buf[start..start + n * ch].copy_from_slice(&src[..n * ch]);
            src = &src[n * ch..];
            self.tail = (self.tail + n) % self.capacity;
        }

        self.size = (self.size + count).min(self.capacity);
        self.head = (self.tail + self.capacity - self.size) % self.capacity;
        self.position += count as i64;
        count
    }

    /// Copy `count` multi-channel samples starting at absolute position
    /// `start` into `dst`.
    ///
    /// Positions older than the retained history read as silence. The caller
    /// must not request samples at or past [`position`](Self::position).
    pub fn read_into(&self, dst: &mut [S], start: i64, count: usize) {
        let ch = self.channels;
        debug_assert!(dst.len() >= count * ch);
        debug_assert!(start + count as i64 <= self.position);

        let first = self.first_retained();
        let zeros = if start < first {
            ((first - start) as usize).min(count)
        } else {
            0
        };
        dst[..zeros * ch].fill(S::default());
        if zeros == count {
            return;
        }

        let mut offset = (start + zeros as i64 - first) as usize;
        let mut written = zeros;
        while written < count {
            let idx = (self.head + offset) % self.capacity;
            let n = (count - written).min(self.capacity - idx);
            dst[written * ch..(written + n) * ch]
                .copy_from_slice(&self.buf[idx * ch..(idx + n) * ch]);
            written += n;
            offset += n;
        }
    }

    /// Reset to empty without releasing storage.
    pub fn clear(&mut self) {
        self.head = 0;
        self.tail = 0;
        self.size = 0;
        self.position = 0;
    }
}
