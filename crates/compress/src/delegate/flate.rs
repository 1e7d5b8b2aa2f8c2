//! In-process streaming gzip delegate built on `flate2`.

use super::{FastProvider, FastStream};
use crate::error::{ErrorKind, Result};
use crate::{Progress, Status};
use exn::ResultExt;
use flate2::{Compression as GzCompression, write::GzEncoder};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Highest level the deflate encoder understands; the delegate scale goes to
/// 10, so anything above this is clamped.
const MAX_DEFLATE_LEVEL: u8 = 9;

/// Streaming gzip provider.
///
/// # Examples
///
/// ```
/// use squash_compress::delegate::{FastProvider, FastStream, FlateProvider};
///
/// let provider = FlateProvider::new();
/// assert!(provider.create(0).is_err());
/// provider.init().unwrap();
/// let mut stream = provider.create(0).unwrap();
///
/// let mut output = [0u8; 256];
/// let progress = stream.compress(b"Hello, world!", &mut output, 6).unwrap();
/// assert_eq!(progress.consumed, 13);
/// ```
#[derive(Debug)]
pub struct FlateProvider {
    name: String,
    initialized: AtomicBool,
}

impl Default for FlateProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FlateProvider {
    pub fn new() -> Self {
        Self { name: "flate2".to_string(), initialized: AtomicBool::new(false) }
    }

    /// Change the name of the provider.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl FastProvider for FlateProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn init(&self) -> Result<()> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn deinit(&self) {
        self.initialized.store(false, Ordering::Release);
    }

    fn create(&self, _reserved: u32) -> Result<Box<dyn FastStream>> {
        if !self.initialized.load(Ordering::Acquire) {
            exn::bail!(ErrorKind::DelegateUnavailable);
        }
        Ok(Box::new(FlateStream::default()))
    }
}

/// One gzip member being produced.
///
/// The encoder's sink doubles as the queue of output not yet handed to the
/// host. Every non-empty chunk is taken in full; whatever does not fit the
/// output area stays queued and goes out ahead of anything newer.
#[derive(Default)]
struct FlateStream {
    encoder: Option<GzEncoder<Vec<u8>>>,
    finished: bool,
}

impl FlateStream {
    fn drain(queue: &mut Vec<u8>, output: &mut [u8]) -> usize {
        let count = queue.len().min(output.len());
        output[..count].copy_from_slice(&queue[..count]);
        queue.drain(..count);
        count
    }
}

impl FastStream for FlateStream {
    fn compress(&mut self, input: &[u8], output: &mut [u8], intensity: u8) -> Result<Progress> {
        if self.finished && !input.is_empty() {
            exn::bail!(ErrorKind::InvalidArgument("input submitted after end of stream".to_string()));
        }
        // The encoder level is fixed by the first call of the stream.
        let encoder = self
            .encoder
            .get_or_insert_with(|| GzEncoder::new(Vec::new(), GzCompression::new(intensity.min(MAX_DEFLATE_LEVEL).into())));

        let mut produced = Self::drain(encoder.get_mut(), output);
        if input.is_empty() {
            if !self.finished {
                encoder.try_finish().or_raise(|| ErrorKind::Delegate)?;
                self.finished = true;
            }
        } else {
            encoder.write_all(input).or_raise(|| ErrorKind::Delegate)?;
        }

        produced += Self::drain(encoder.get_mut(), &mut output[produced..]);
        let status = if self.finished && encoder.get_ref().is_empty() { Status::Complete } else { Status::Pending };
        Ok(Progress { consumed: input.len(), produced, status })
    }
}
