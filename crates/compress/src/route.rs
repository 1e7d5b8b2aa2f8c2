//! Quality level routing.
//!
//! Levels `1..=5` are forwarded to the fast streaming delegate, which runs
//! on a scale twice as fine-grained as the host's. Levels `6..=10` are
//! accumulated and compressed in one batch, with an effort taken from an
//! [`EffortTable`].

use crate::error::{Error, ErrorKind, Result};
use exn::OptionExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::num::NonZeroU64;

const MIN_LEVEL: i32 = 1;
const MAX_LEVEL: i32 = 10;
const MAX_FAST_LEVEL: u8 = 5;
const FAST_INTENSITY_FACTOR: u8 = 2;

const fn effort(iterations: u64) -> NonZeroU64 {
    match NonZeroU64::new(iterations) {
        Some(effort) => effort,
        None => panic!("batch effort must be non-zero"),
    }
}

/// Batch efforts for levels 6, 7, 8, 9 and 10.
const DEFAULT_EFFORTS: [NonZeroU64; EffortTable::LEN] = [effort(1), effort(5), effort(10), effort(15), effort(20)];

/// A validated host quality level in `1..=10`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Level(u8);

impl Level {
    pub const MIN: Level = Level(MIN_LEVEL as u8);
    pub const MAX: Level = Level(MAX_LEVEL as u8);

    /// Validate a raw level as supplied by the host.
    pub fn new(level: i32) -> Result<Self> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            exn::bail!(ErrorKind::InvalidArgument(format!(
                "level {level} outside {MIN_LEVEL}..={MAX_LEVEL}"
            )));
        }
        Ok(Self(level as u8))
    }

    #[inline]
    #[must_use]
    pub fn get(&self) -> u8 {
        self.0
    }

    /// Whether this level is served by the fast streaming delegate.
    #[inline]
    #[must_use]
    pub fn is_fast(&self) -> bool {
        self.0 <= MAX_FAST_LEVEL
    }
}

impl TryFrom<i32> for Level {
    type Error = Error;
    fn try_from(value: i32) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.0)
    }
}

/// Where a single call is sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    /// Forward to the delegate, driving it at `intensity` on its own scale.
    Fast { intensity: u8 },
    /// Accumulate for the batch backend, compressing with `effort`.
    Batch { effort: NonZeroU64 },
}

impl Route {
    #[must_use]
    pub fn is_fast(&self) -> bool {
        matches!(self, Route::Fast { .. })
    }
}

/// Batch effort per batch-path level, in ascending level order.
///
/// Higher effort trades CPU time for smaller output. The defaults are
/// `1, 5, 10, 15, 20` for levels `6..=10`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffortTable([NonZeroU64; EffortTable::LEN]);

impl Default for EffortTable {
    fn default() -> Self {
        Self(DEFAULT_EFFORTS)
    }
}

impl EffortTable {
    /// Number of batch-path levels.
    pub const LEN: usize = (MAX_LEVEL as u8 - MAX_FAST_LEVEL) as usize;

    pub fn new(efforts: [NonZeroU64; Self::LEN]) -> Self {
        Self(efforts)
    }

    /// Build a table from raw iteration counts, rejecting zeroes.
    pub fn from_iterations(iterations: [u64; Self::LEN]) -> Result<Self> {
        let mut efforts = DEFAULT_EFFORTS;
        for (slot, (index, raw)) in efforts.iter_mut().zip(iterations.into_iter().enumerate()) {
            *slot = NonZeroU64::new(raw).ok_or_raise(|| {
                ErrorKind::InvalidArgument(format!(
                    "effort for level {} must be at least 1",
                    index + usize::from(MAX_FAST_LEVEL) + 1
                ))
            })?;
        }
        Ok(Self(efforts))
    }

    /// The batch effort for `level`, or `None` for fast-path levels.
    #[must_use]
    pub fn effort(&self, level: Level) -> Option<NonZeroU64> {
        level.get().checked_sub(MAX_FAST_LEVEL + 1).and_then(|index| self.0.get(usize::from(index))).copied()
    }

    /// Decide where a call at `level` goes.
    #[must_use]
    pub fn route(&self, level: Level) -> Route {
        match self.effort(level) {
            Some(effort) => Route::Batch { effort },
            None => Route::Fast { intensity: level.get() * FAST_INTENSITY_FACTOR },
        }
    }

    pub fn as_slice(&self) -> &[NonZeroU64] {
        &self.0
    }
}
