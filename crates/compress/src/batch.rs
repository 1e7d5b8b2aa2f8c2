//! One-shot, high-ratio batch compression.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::num::NonZeroU64;
use tracing::instrument;
use zopfli::{Format, Options};

/// A compressor that needs the whole input before producing any output.
///
/// Implementations are treated as pure functions of `(input, effort)`: the
/// same input and effort must always produce the same bytes. An empty
/// result is reported by the session as a backend failure.
pub trait BatchCompressor: Send + Sync {
    /// Compress the complete `input` in one call. Higher `effort` spends more
    /// CPU time looking for a smaller encoding.
    fn compress(&self, input: &[u8], effort: NonZeroU64) -> Result<Vec<u8>>;
}

/// Zopfli-backed gzip batch compressor.
///
/// The effort is used as Zopfli's iteration count. Output is always a
/// complete gzip member.
#[derive(Clone, Copy, Debug)]
pub struct ZopfliBackend {
    iterations_without_improvement: Option<NonZeroU64>,
    maximum_block_splits: Option<u16>,
}

impl Default for ZopfliBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ZopfliBackend {
    pub const fn new() -> Self {
        Self { iterations_without_improvement: None, maximum_block_splits: None }
    }

    /// Stop iterating early once this many iterations in a row fail to
    /// shrink the output.
    #[must_use]
    pub fn with_iterations_without_improvement(mut self, limit: NonZeroU64) -> Self {
        self.iterations_without_improvement = Some(limit);
        self
    }

    /// Cap the number of deflate block splits (`0` means unlimited).
    #[must_use]
    pub fn with_maximum_block_splits(mut self, splits: u16) -> Self {
        self.maximum_block_splits = Some(splits);
        self
    }

    fn options(&self, effort: NonZeroU64) -> Options {
        let mut options = Options::default();
        options.iteration_count = effort;
        if let Some(limit) = self.iterations_without_improvement {
            options.iterations_without_improvement = limit;
        }
        if let Some(splits) = self.maximum_block_splits {
            options.maximum_block_splits = splits;
        }
        options
    }
}

impl BatchCompressor for ZopfliBackend {
    #[instrument(skip(self, input), fields(
        format = "gzip",
        input_size = input.len(),
        effort = effort.get(),
        output_size
    ))]
    fn compress(&self, input: &[u8], effort: NonZeroU64) -> Result<Vec<u8>> {
        let mut output = Vec::new();
        zopfli::compress(self.options(effort), Format::Gzip, input, &mut output).or_raise(|| ErrorKind::Backend)?;
        tracing::Span::current().record("output_size", output.len());
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use rstest::rstest;
    use std::io::Read;

    fn gunzip(data: &[u8]) -> Vec<u8> {
        let mut output = Vec::new();
        GzDecoder::new(data).read_to_end(&mut output).unwrap();
        output
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[case(20)]
    fn test_output_is_gzip(#[case] effort: u64) {
        let original = b"Hello, world! Hello, world! Hello, world! This is a test of batch compression.";
        let compressed = ZopfliBackend::new().compress(original, NonZeroU64::new(effort).unwrap()).unwrap();
        assert_eq!(&compressed[..2], &[0x1F, 0x8B]);
        assert_eq!(gunzip(&compressed), original);
    }

    #[test]
    fn test_empty_input_still_produces_a_member() {
        let compressed = ZopfliBackend::new().compress(b"", NonZeroU64::MIN).unwrap();
        assert!(!compressed.is_empty());
        assert!(gunzip(&compressed).is_empty());
    }

    #[test]
    fn test_deterministic() {
        let backend = ZopfliBackend::new().with_maximum_block_splits(4);
        let input = vec![b'A'; 1000];
        let effort = NonZeroU64::new(10).unwrap();
        assert_eq!(backend.compress(&input, effort).unwrap(), backend.compress(&input, effort).unwrap());
    }

    #[test]
    fn test_options_overrides() {
        let limit = NonZeroU64::new(3).unwrap();
        let options = ZopfliBackend::new()
            .with_iterations_without_improvement(limit)
            .with_maximum_block_splits(0)
            .options(NonZeroU64::new(15).unwrap());
        assert_eq!(options.iteration_count.get(), 15);
        assert_eq!(options.iterations_without_improvement, limit);
        assert_eq!(options.maximum_block_splits, 0);
    }
}
