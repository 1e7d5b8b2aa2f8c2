//! Scripted fast-path provider for testing.

use super::{FastProvider, FastStream};
use crate::error::{ErrorKind, Result};
use crate::Progress;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A call observed by a [`ScriptedProvider`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Init,
    Deinit,
    Create { reserved: u32 },
    Compress { input: usize, capacity: usize, intensity: u8 },
    Destroy,
}

type CallLog = Arc<Mutex<Vec<Call>>>;

/// Deterministic provider whose streams echo their input.
///
/// Every lifecycle and compress call is recorded, including the intensity a
/// session forwarded, so tests can assert exactly what reached the delegate.
///
/// # Examples
///
/// ```
/// use squash_compress::delegate::{Call, FastProvider, ScriptedProvider};
///
/// let provider = ScriptedProvider::default();
/// provider.init().unwrap();
/// drop(provider.create(7).unwrap());
/// assert_eq!(provider.calls(), [Call::Init, Call::Create { reserved: 7 }, Call::Destroy]);
/// ```
#[derive(Default)]
pub struct ScriptedProvider {
    calls: CallLog,
    initialized: AtomicBool,
    fail_init: bool,
    fail_compress: bool,
}

impl ScriptedProvider {
    /// Make [`init`](FastProvider::init) fail.
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Make every stream's `compress` fail.
    pub fn failing_compress(mut self) -> Self {
        self.fail_compress = true;
        self
    }

    /// Snapshot of the calls made so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Intensities passed to `compress`, oldest first.
    pub fn intensities(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Compress { intensity, .. } => Some(intensity),
                _ => None,
            })
            .collect()
    }

    fn record(log: &CallLog, call: Call) {
        log.lock().unwrap_or_else(PoisonError::into_inner).push(call);
    }
}

impl FastProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn init(&self) -> Result<()> {
        Self::record(&self.calls, Call::Init);
        if self.fail_init {
            exn::bail!(ErrorKind::Delegate);
        }
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    fn deinit(&self) {
        Self::record(&self.calls, Call::Deinit);
        self.initialized.store(false, Ordering::Release);
    }

    fn create(&self, reserved: u32) -> Result<Box<dyn FastStream>> {
        if !self.initialized.load(Ordering::Acquire) {
            exn::bail!(ErrorKind::DelegateUnavailable);
        }
        Self::record(&self.calls, Call::Create { reserved });
        Ok(Box::new(ScriptedStream { calls: Arc::clone(&self.calls), fail: self.fail_compress }))
    }
}

struct ScriptedStream {
    calls: CallLog,
    fail: bool,
}

impl FastStream for ScriptedStream {
    fn compress(&mut self, input: &[u8], output: &mut [u8], intensity: u8) -> Result<Progress> {
        ScriptedProvider::record(
            &self.calls,
            Call::Compress { input: input.len(), capacity: output.len(), intensity },
        );
        if self.fail {
            exn::bail!(ErrorKind::Delegate);
        }
        if input.is_empty() {
            return Ok(Progress::complete(0));
        }
        let count = input.len().min(output.len());
        output[..count].copy_from_slice(&input[..count]);
        Ok(Progress::pending(count, count))
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        ScriptedProvider::record(&self.calls, Call::Destroy);
    }
}
