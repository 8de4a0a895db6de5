pub mod pool;
pub mod ring;

pub use pool::{BufferPool, PoolStats};
pub use ring::SampleRing;

use crate::common::errors::{CodecError, CodecResult};

/// Allocate a `len`-element vector filled with `fill`, reporting failure
/// instead of aborting.
pub fn try_vec<T: Clone>(len: usize, fill: T) -> CodecResult<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| CodecError::OutOfMemory {
            requested: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    buf.resize(len, fill);
    Ok(buf)
}
