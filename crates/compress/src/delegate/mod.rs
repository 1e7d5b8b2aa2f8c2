//! Fast-path delegate capability and implementations.
//!
//! The fast path hands every call, unchanged apart from the intensity
//! transform, to an external streaming compressor. That compressor is
//! modelled as a [`FastProvider`] (process-wide lifecycle and session
//! factory) handing out [`FastStream`]s (one per host session). Destroying a
//! delegate session is dropping its [`FastStream`].

mod flate;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::flate::FlateProvider;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{Call, ScriptedProvider};
use crate::Progress;
use crate::error::Result;
use std::sync::Arc;

/// Shared handle to a fast-path provider.
pub type ProviderHandle = Arc<dyn FastProvider>;

/// Process-wide side of a streaming compressor.
///
/// `init` must succeed before `create` is usable; after `deinit`, `create`
/// should fail until `init` is called again.
pub trait FastProvider: Send + Sync {
    /// Name of the provider (used for logging only).
    fn name(&self) -> &str;

    fn init(&self) -> Result<()>;

    fn deinit(&self);

    /// Create a delegate session. `reserved` is passed through from the
    /// host untouched.
    fn create(&self, reserved: u32) -> Result<Box<dyn FastStream>>;
}

/// Per-session side of a streaming compressor.
///
/// Follows the same call shape as the host protocol: an empty `input` is the
/// end-of-stream signal, `output` is the space the host can accept right
/// now, and the returned [`Progress`] reports what was consumed and produced.
pub trait FastStream: Send {
    /// `intensity` is on the delegate's own scale, `0..=10`.
    fn compress(&mut self, input: &[u8], output: &mut [u8], intensity: u8) -> Result<Progress>;
}
