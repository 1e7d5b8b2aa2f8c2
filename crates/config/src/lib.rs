//! Layered configuration for squash.
//!
//! Sources, later ones winning:
//!
//! 1. compiled-in defaults,
//! 2. a TOML file (an explicit path, or `squash.toml` in the platform
//!    configuration directory when present),
//! 3. environment variables prefixed `SQUASH_`, with `__` separating
//!    nested keys (`SQUASH_HOST__CHUNK_SIZE=65536`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use squash_compress::{EffortTable, StreamBuffers, ZopfliBackend};
use std::num::{NonZeroU64, NonZeroUsize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "SQUASH_";
const FILE_NAME: &str = "squash.toml";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub batch: BatchSettings,
    pub host: HostSettings,
    pub log: LogSettings,
}

/// Tuning for the batch (levels 6–10) backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Effort (Zopfli iterations) for levels 6, 7, 8, 9 and 10.
    pub iterations: [u64; EffortTable::LEN],
    /// Stop after this many iterations without improvement; `0` never stops early.
    pub iterations_without_improvement: u64,
    /// Maximum deflate block splits; `0` is unlimited.
    pub max_block_splits: u16,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { iterations: [1, 5, 10, 15, 20], iterations_without_improvement: 0, max_block_splits: 15 }
    }
}

/// Buffer sizes used by the host simulator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSettings {
    pub chunk_size: usize,
    pub output_capacity: usize,
}

impl Default for HostSettings {
    fn default() -> Self {
        let buffers = StreamBuffers::default();
        Self { chunk_size: buffers.chunk_size.get(), output_capacity: buffers.output_capacity.get() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Settings {
    /// Load and validate settings from all sources.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path
            && !path.is_file()
        {
            exn::bail!(ErrorKind::Invalid(format!("configuration file not found: {}", path.display())));
        }
        Self::from_figment(Self::figment(path))
    }

    /// The layered sources, before extraction.
    pub fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(Settings::default()));
        let figment = match path.map(Path::to_path_buf).or_else(default_path) {
            Some(path) => {
                tracing::debug!(path = %path.display(), "configuration file");
                figment.merge(Toml::file_exact(path))
            },
            None => figment,
        };
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Self = figment.extract().or_raise(|| ErrorKind::Load)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.effort_table()?;
        self.stream_buffers()?;
        if self.log.level.trim().is_empty() {
            exn::bail!(ErrorKind::Invalid("log.level must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn effort_table(&self) -> Result<EffortTable> {
        EffortTable::from_iterations(self.batch.iterations)
            .map_err(|err| err.raise(ErrorKind::Invalid("batch.iterations".to_string())))
    }

    pub fn batch_backend(&self) -> ZopfliBackend {
        let backend = ZopfliBackend::new().with_maximum_block_splits(self.batch.max_block_splits);
        match NonZeroU64::new(self.batch.iterations_without_improvement) {
            Some(limit) => backend.with_iterations_without_improvement(limit),
            None => backend,
        }
    }

    pub fn stream_buffers(&self) -> Result<StreamBuffers> {
        let nonzero = |value: usize, key: &str| {
            NonZeroUsize::new(value).ok_or_raise(|| ErrorKind::Invalid(format!("{key} must be at least 1")))
        };
        Ok(StreamBuffers {
            chunk_size: nonzero(self.host.chunk_size, "host.chunk_size")?,
            output_capacity: nonzero(self.host.output_capacity, "host.output_capacity")?,
        })
    }
}

/// `squash.toml` in the platform configuration directory.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "squash").map(|dirs| dirs.config_dir().join(FILE_NAME))
}
