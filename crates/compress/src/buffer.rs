//! Append-only input accumulation.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;

/// An owned, append-only byte container.
///
/// Grows by exactly the additional space each [`append`](Self::append)
/// needs rather than geometrically: input is accumulated once and compressed
/// once, so memory tightness matters more than amortized append throughput.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GrowableBuffer {
    bytes: Vec<u8>,
}

impl GrowableBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `chunk` after the existing content.
    ///
    /// On allocation failure the buffer is left exactly as it was.
    pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
        self.bytes.try_reserve_exact(chunk.len()).or_raise(|| ErrorKind::OutOfMemory)?;
        self.bytes.extend_from_slice(chunk);
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for GrowableBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}
