//! Driving a session from a reader to a writer with fixed-size buffers.

use crate::error::{ErrorKind, Result};
use crate::session::{Progress, Session};
use exn::{OptionExt, ResultExt};
use std::io::{ErrorKind as IoErrorKind, Read, Write};
use std::num::NonZeroUsize;
use tracing::instrument;

const DEFAULT_CHUNK_SIZE: NonZeroUsize = NonZeroUsize::new(8 * 1024).unwrap();
const DEFAULT_OUTPUT_CAPACITY: NonZeroUsize = NonZeroUsize::new(4 * 1024).unwrap();

/// Buffer sizes a host hands to each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamBuffers {
    /// Largest input chunk submitted per call.
    pub chunk_size: NonZeroUsize,
    /// Size of the output area offered per call.
    pub output_capacity: NonZeroUsize,
}

impl Default for StreamBuffers {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, output_capacity: DEFAULT_OUTPUT_CAPACITY }
    }
}

/// Byte and call counts for one driven stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamTotals {
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub calls: u64,
}

impl StreamTotals {
    fn record(&mut self, progress: &Progress) {
        self.input_bytes += progress.consumed as u64;
        self.output_bytes += progress.produced as u64;
        self.calls += 1;
    }
}

impl Session {
    /// Compress everything from `reader` into `writer`, calling
    /// [`compress`](Self::compress) exactly the way a bounded-buffer host
    /// would: input in chunks of at most `buffers.chunk_size` (resubmitting
    /// whatever a call did not consume), then empty chunks until the stream
    /// reports completion.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use squash_compress::{Scheme, StreamBuffers};
    ///
    /// let scheme = Scheme::default();
    /// scheme.initialize().unwrap();
    /// let mut session = scheme.create_session(0).unwrap();
    ///
    /// let mut compressed = Vec::new();
    /// let totals = session
    ///     .compress_stream(Cursor::new(b"Hello, world!"), &mut compressed, 7, StreamBuffers::default())
    ///     .unwrap();
    /// assert_eq!(totals.input_bytes, 13);
    /// assert_eq!(totals.output_bytes, compressed.len() as u64);
    /// ```
    #[instrument(skip(self, reader, writer), fields(input_bytes, output_bytes, calls))]
    pub fn compress_stream<R: Read, W: Write>(
        &mut self,
        mut reader: R,
        mut writer: W,
        level: i32,
        buffers: StreamBuffers,
    ) -> Result<StreamTotals> {
        let mut totals = StreamTotals::default();
        let mut chunk = vec![0u8; buffers.chunk_size.get()];
        let mut area = vec![0u8; buffers.output_capacity.get()];

        loop {
            let read = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) if err.kind() == IoErrorKind::Interrupted => continue,
                Err(err) => return Err(err).or_raise(|| ErrorKind::Io),
            };
            let mut rest = &chunk[..read];
            while !rest.is_empty() {
                let progress = self.compress(rest, &mut area, level)?;
                totals.record(&progress);
                if progress.consumed == 0 && progress.produced == 0 {
                    exn::bail!(ErrorKind::Internal("call neither consumed input nor produced output".to_string()));
                }
                writer.write_all(&area[..progress.produced]).or_raise(|| ErrorKind::Io)?;
                rest = rest.get(progress.consumed..).ok_or_raise(|| {
                    ErrorKind::Internal(format!(
                        "{} bytes reported consumed from a {} byte chunk",
                        progress.consumed,
                        rest.len()
                    ))
                })?;
            }
        }

        loop {
            let progress = self.compress(&[], &mut area, level)?;
            totals.record(&progress);
            writer.write_all(&area[..progress.produced]).or_raise(|| ErrorKind::Io)?;
            if progress.is_complete() {
                break;
            }
            if progress.produced == 0 {
                exn::bail!(ErrorKind::Internal("drain call produced no output".to_string()));
            }
        }
        writer.flush().or_raise(|| ErrorKind::Io)?;

        let span = tracing::Span::current();
        span.record("input_bytes", totals.input_bytes);
        span.record("output_bytes", totals.output_bytes);
        span.record("calls", totals.calls);
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Scheme;
    use crate::delegate::ScriptedProvider;
    use std::io::Cursor;
    use std::sync::Arc;

    fn buffers(chunk_size: usize, output_capacity: usize) -> StreamBuffers {
        StreamBuffers {
            chunk_size: NonZeroUsize::new(chunk_size).unwrap(),
            output_capacity: NonZeroUsize::new(output_capacity).unwrap(),
        }
    }

    #[test]
    fn test_fast_path_resubmits_unconsumed_input() {
        let scheme = Scheme::new(Arc::new(ScriptedProvider::default()));
        scheme.initialize().unwrap();
        let mut session = scheme.create_session(0).unwrap();
        let original = b"0123456789abcdefghij".to_vec();
        let mut output = Vec::new();
        let totals = session.compress_stream(Cursor::new(&original), &mut output, 3, buffers(8, 3)).unwrap();
        // The scripted delegate echoes its input.
        assert_eq!(output, original);
        assert_eq!(totals.input_bytes, 20);
        assert_eq!(totals.output_bytes, 20);
        // Chunks of 8, 8 and 4 bytes take 3, 3 and 2 calls, then one empty call.
        assert_eq!(totals.calls, 9);
    }

    #[test]
    fn test_unavailable_delegate_stops_stream() {
        let scheme = Scheme::new(Arc::new(ScriptedProvider::default()));
        let mut session = scheme.create_session(0).unwrap();
        let err = session.compress_stream(Cursor::new(b"abc"), Vec::new(), 1, buffers(2, 2)).unwrap_err();
        assert_eq!(*err, ErrorKind::DelegateUnavailable);
    }

    #[test]
    fn test_default_buffers() {
        let defaults = StreamBuffers::default();
        assert_eq!(defaults.chunk_size.get(), 8192);
        assert_eq!(defaults.output_capacity.get(), 4096);
    }
}
