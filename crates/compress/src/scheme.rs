//! Process-wide compression context.

use crate::batch::{BatchCompressor, ZopfliBackend};
use crate::delegate::{FlateProvider, ProviderHandle};
use crate::error::{ErrorKind, Result};
use crate::route::EffortTable;
use crate::session::Session;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ProviderState {
    Uninitialized,
    Ready,
    /// `init` failed; the fast path stays unavailable for the scheme's lifetime.
    Unavailable,
    Deinitialized,
}

/// Provider state shared by a scheme and every session created from it.
#[derive(Debug)]
struct Lifecycle {
    state: ProviderState,
    /// Bumped on every successful `init`.
    generation: u64,
}

type SharedLifecycle = Arc<Mutex<Lifecycle>>;

fn lock(lifecycle: &Mutex<Lifecycle>) -> MutexGuard<'_, Lifecycle> {
    lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A session's tie to the provider initialization its delegate came from.
///
/// Goes stale once the provider is deinitialized, even if it is later
/// initialized again, and when the scheme is dropped.
#[derive(Clone, Debug)]
pub(crate) struct ProviderLease {
    lifecycle: SharedLifecycle,
    generation: u64,
}

impl ProviderLease {
    pub(crate) fn is_live(&self) -> bool {
        let lifecycle = lock(&self.lifecycle);
        lifecycle.state == ProviderState::Ready && lifecycle.generation == self.generation
    }
}

/// The explicitly constructed context every session is created from.
///
/// Owns the fast-path provider, the batch backend and the effort table.
/// Construct one per process (or per host), [`initialize`](Self::initialize)
/// it, then create any number of sessions. Dropping the scheme
/// deinitializes the provider.
///
/// # Examples
///
/// ```
/// use squash_compress::Scheme;
///
/// let scheme = Scheme::default();
/// scheme.initialize().unwrap();
/// let session = scheme.create_session(0).unwrap();
/// assert!(session.has_delegate());
/// scheme.destroy_session(session);
/// scheme.deinitialize();
/// ```
pub struct Scheme {
    provider: ProviderHandle,
    batch: Arc<dyn BatchCompressor>,
    efforts: EffortTable,
    lifecycle: SharedLifecycle,
}

impl Default for Scheme {
    fn default() -> Self {
        Self::new(Arc::new(FlateProvider::new()))
    }
}

impl Scheme {
    /// A scheme over `provider` with the Zopfli batch backend and the
    /// default effort table.
    pub fn new(provider: ProviderHandle) -> Self {
        Self {
            provider,
            batch: Arc::new(ZopfliBackend::new()),
            efforts: EffortTable::default(),
            lifecycle: Arc::new(Mutex::new(Lifecycle { state: ProviderState::Uninitialized, generation: 0 })),
        }
    }

    #[must_use]
    pub fn with_batch(mut self, batch: Arc<dyn BatchCompressor>) -> Self {
        self.batch = batch;
        self
    }

    #[must_use]
    pub fn with_efforts(mut self, efforts: EffortTable) -> Self {
        self.efforts = efforts;
        self
    }

    pub fn efforts(&self) -> &EffortTable {
        &self.efforts
    }

    /// Bring up the fast-path provider.
    ///
    /// Calling this again once it has succeeded does nothing. If the provider
    /// fails to initialize, the error is returned and the fast path is
    /// unavailable from then on; batch-path levels keep working.
    pub fn initialize(&self) -> Result<()> {
        let mut lifecycle = lock(&self.lifecycle);
        match lifecycle.state {
            ProviderState::Ready => Ok(()),
            ProviderState::Unavailable => exn::bail!(ErrorKind::DelegateUnavailable),
            ProviderState::Uninitialized | ProviderState::Deinitialized => match self.provider.init() {
                Ok(()) => {
                    lifecycle.state = ProviderState::Ready;
                    lifecycle.generation += 1;
                    info!(provider = self.provider.name(), "fast-path provider initialized");
                    Ok(())
                },
                Err(err) => {
                    lifecycle.state = ProviderState::Unavailable;
                    warn!(provider = self.provider.name(), "fast-path provider failed to initialize");
                    Err(err)
                },
            },
        }
    }

    /// Release the fast-path provider. Safe to call in any state.
    ///
    /// Sessions created before this point lose their delegate: fast-path
    /// calls on them fail with [`DelegateUnavailable`](ErrorKind::DelegateUnavailable).
    pub fn deinitialize(&self) {
        let mut lifecycle = lock(&self.lifecycle);
        if lifecycle.state == ProviderState::Ready {
            self.provider.deinit();
            lifecycle.state = ProviderState::Deinitialized;
            debug!(provider = self.provider.name(), "fast-path provider deinitialized");
        }
    }

    /// Whether fast-path levels can currently be served.
    pub fn fast_path_available(&self) -> bool {
        lock(&self.lifecycle).state == ProviderState::Ready
    }

    /// Begin a compression stream.
    ///
    /// A delegate session is created up front whenever the provider is
    /// ready, whatever level the stream later uses. Without a ready provider
    /// the session is still created, and fast-path calls on it fail with
    /// [`DelegateUnavailable`](ErrorKind::DelegateUnavailable).
    pub fn create_session(&self, reserved: u32) -> Result<Session> {
        let session = Session::new(self.efforts, Arc::clone(&self.batch));
        let lifecycle = lock(&self.lifecycle);
        if lifecycle.state != ProviderState::Ready {
            debug!(reserved, delegate = false, "session created");
            return Ok(session);
        }
        let lease = ProviderLease { lifecycle: Arc::clone(&self.lifecycle), generation: lifecycle.generation };
        let stream = self.provider.create(reserved)?;
        debug!(reserved, delegate = true, "session created");
        Ok(session.with_delegate(stream, lease))
    }

    /// End a compression stream, releasing its buffers and delegate session.
    pub fn destroy_session(&self, session: Session) {
        drop(session);
    }
}

impl Drop for Scheme {
    fn drop(&mut self) {
        self.deinitialize();
    }
}
