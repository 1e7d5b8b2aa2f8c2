//! Per-stream compression state.
//!
//! A [`Session`] reconciles a host that calls repeatedly with small buffers
//! with a batch compressor that needs everything up front:
//!
//! 1. **Accumulating**: every non-empty chunk is appended in full.
//! 2. The first empty chunk is the end-of-input signal. The batch compressor
//!    runs exactly once over everything accumulated.
//! 3. **Draining**: compressed output is handed back in slices no larger than
//!    the host's output area.
//! 4. **Done**: everything has been delivered; further drain calls keep
//!    reporting [`Status::Complete`].
//!
//! Fast-path levels bypass all of this and go straight to the delegate.

use crate::batch::BatchCompressor;
use crate::buffer::GrowableBuffer;
use crate::delegate::FastStream;
use crate::error::{ErrorKind, Result};
use crate::route::{EffortTable, Level, Route};
use crate::scheme::ProviderLease;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::num::NonZeroU64;
use std::sync::Arc;
use tracing::{debug, instrument, trace, warn};

/// Successful outcome of a compress call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// More input is expected, or more output is waiting to be drained.
    Pending,
    /// All output has been delivered. Repeating the call is harmless.
    Complete,
}

/// What a single compress call did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    /// Bytes taken from the input chunk.
    pub consumed: usize,
    /// Bytes written to the front of the output area.
    pub produced: usize,
    pub status: Status,
}

impl Progress {
    #[must_use]
    pub const fn pending(consumed: usize, produced: usize) -> Self {
        Self { consumed, produced, status: Status::Pending }
    }

    #[must_use]
    pub const fn complete(produced: usize) -> Self {
        Self { consumed: 0, produced, status: Status::Complete }
    }

    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }
}

/// Observable state of the batch path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Accumulating,
    Draining,
    Done,
    /// A terminal failure occurred; the session can only be destroyed.
    Failed,
}

/// The two paths a call can take, without their parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Path {
    Fast,
    Batch,
}

/// A delegate session and the provider initialization it belongs to.
struct Delegate {
    stream: Box<dyn FastStream>,
    lease: ProviderLease,
}

/// One host-initiated compression stream.
///
/// Created by [`Scheme::create_session`](crate::Scheme::create_session) and
/// destroyed by dropping it (or through
/// [`Scheme::destroy_session`](crate::Scheme::destroy_session)), which is safe
/// in any state. A session is driven by one caller at a time; distinct
/// sessions share nothing mutable and can run on separate threads.
pub struct Session {
    efforts: EffortTable,
    batch: Arc<dyn BatchCompressor>,
    delegate: Option<Delegate>,
    input: GrowableBuffer,
    output: Option<Vec<u8>>,
    delivered: usize,
    failed: bool,
    path: Option<Path>,
}

impl Session {
    pub(crate) fn new(efforts: EffortTable, batch: Arc<dyn BatchCompressor>) -> Self {
        Self {
            efforts,
            batch,
            delegate: None,
            input: GrowableBuffer::new(),
            output: None,
            delivered: 0,
            failed: false,
            path: None,
        }
    }

    pub(crate) fn with_delegate(mut self, stream: Box<dyn FastStream>, lease: ProviderLease) -> Self {
        self.delegate = Some(Delegate { stream, lease });
        self
    }

    /// Submit `input` and collect whatever output fits in `output`.
    ///
    /// `level` is the host's quality level and is routed on every call:
    /// `1..=5` forward to the fast-path delegate, `6..=10` go through the
    /// accumulate/compress/drain state machine. An empty `input` means end of
    /// input. Non-empty input after that is rejected with
    /// [`InvalidArgument`](ErrorKind::InvalidArgument) and leaves the session
    /// untouched, as does an out-of-range `level`.
    ///
    /// Both paths keep their own state, so moving between them mid-stream
    /// does not carry data across. Input accumulated at a batch level is
    /// abandoned if the caller moves to a fast-path level: it is never
    /// compressed, and the fast path only sees what is submitted to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use squash_compress::{Scheme, Status};
    ///
    /// let scheme = Scheme::default();
    /// scheme.initialize().unwrap();
    /// let mut session = scheme.create_session(0).unwrap();
    ///
    /// let progress = session.compress(b"Hello, world!", &mut [], 8).unwrap();
    /// assert_eq!(progress.consumed, 13);
    ///
    /// let mut output = Vec::new();
    /// let mut area = [0u8; 16];
    /// loop {
    ///     let progress = session.compress(&[], &mut area, 8).unwrap();
    ///     output.extend_from_slice(&area[..progress.produced]);
    ///     if progress.status == Status::Complete {
    ///         break;
    ///     }
    /// }
    /// assert_eq!(output.len(), session.output_len());
    /// ```
    #[instrument(level = "trace", skip_all, fields(input_size = input.len(), capacity = output.len(), level = level))]
    pub fn compress(&mut self, input: &[u8], output: &mut [u8], level: i32) -> Result<Progress> {
        let level = Level::new(level)?;
        if self.failed {
            exn::bail!(ErrorKind::SessionFailed);
        }
        let route = self.efforts.route(level);
        self.note_path(route, level);
        match route {
            Route::Fast { intensity } => self.forward(input, output, intensity),
            Route::Batch { effort } => self.batch_step(input, output, effort),
        }
    }

    /// Accepted for protocol compatibility; deliberately changes nothing.
    pub fn reset(&mut self) -> Result<()> {
        trace!("reset requested; ignored");
        Ok(())
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        if self.failed {
            return Phase::Failed;
        }
        match &self.output {
            None => Phase::Accumulating,
            Some(output) if self.delivered < output.len() => Phase::Draining,
            Some(_) => Phase::Done,
        }
    }

    /// Bytes accumulated for the batch path so far.
    #[must_use]
    pub fn input_len(&self) -> usize {
        self.input.len()
    }

    /// Size of the batch output, or `0` before it has been produced.
    #[must_use]
    pub fn output_len(&self) -> usize {
        self.output.as_ref().map_or(0, Vec::len)
    }

    /// Bytes of batch output already handed to the host.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Whether a delegate session exists for fast-path levels.
    #[must_use]
    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    fn note_path(&mut self, route: Route, level: Level) {
        let path = if route.is_fast() { Path::Fast } else { Path::Batch };
        match self.path.replace(path) {
            None => debug!(%level, ?route, "session routed"),
            Some(previous) if previous != path => {
                warn!(%level, ?previous, ?path, "level changed compression path mid-session")
            },
            Some(_) => {},
        }
    }

    fn forward(&mut self, input: &[u8], output: &mut [u8], intensity: u8) -> Result<Progress> {
        let Some(delegate) = self.delegate.as_mut() else {
            exn::bail!(ErrorKind::DelegateUnavailable);
        };
        if !delegate.lease.is_live() {
            exn::bail!(ErrorKind::DelegateUnavailable);
        }
        delegate.stream.compress(input, output, intensity)
    }

    fn batch_step(&mut self, input: &[u8], output: &mut [u8], effort: NonZeroU64) -> Result<Progress> {
        if !input.is_empty() {
            if self.output.is_some() {
                exn::bail!(ErrorKind::InvalidArgument("input submitted after end of stream".to_string()));
            }
            if let Err(err) = self.input.append(input) {
                self.failed = true;
                return Err(err);
            }
            trace!(appended = input.len(), total = self.input.len(), "input accumulated");
            return Ok(Progress::pending(input.len(), 0));
        }

        if self.output.is_none() {
            let compressed = match self.batch.compress(self.input.as_slice(), effort) {
                Ok(compressed) => compressed,
                Err(err) => {
                    self.failed = true;
                    return Err(err);
                },
            };
            if compressed.is_empty() {
                self.failed = true;
                exn::bail!(ErrorKind::Backend);
            }
            debug!(
                input_size = self.input.len(),
                output_size = compressed.len(),
                effort = effort.get(),
                "batch compression finished"
            );
            self.output = Some(compressed);
        }
        self.drain(output)
    }

    fn drain(&mut self, output: &mut [u8]) -> Result<Progress> {
        let Some(compressed) = self.output.as_deref() else {
            self.failed = true;
            exn::bail!(ErrorKind::Internal("drain before batch output exists".to_string()));
        };
        let remaining = compressed.get(self.delivered..).unwrap_or_default();
        let count = remaining.len().min(output.len());
        debug_assert!(
            self.delivered + count <= compressed.len(),
            "delivering {count} bytes past {} overruns {} bytes of output",
            self.delivered,
            compressed.len()
        );
        let Some(target) = output.get_mut(..count) else {
            self.failed = true;
            exn::bail!(ErrorKind::Internal(format!("{count} bytes do not fit the output area")));
        };
        target.copy_from_slice(&remaining[..count]);
        self.delivered += count;
        trace!(produced = count, delivered = self.delivered, total = compressed.len(), "output drained");

        if self.delivered == compressed.len() {
            Ok(Progress::complete(count))
        } else {
            Ok(Progress::pending(0, count))
        }
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Session")
            .field("phase", &self.phase())
            .field("input_len", &self.input_len())
            .field("output_len", &self.output_len())
            .field("delivered", &self.delivered)
            .field("has_delegate", &self.has_delegate())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(phase = ?self.phase(), input_size = self.input.len(), "session destroyed");
    }
}
