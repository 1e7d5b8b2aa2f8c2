//! Bounded-buffer compression over two very different backends.
//!
//! A host drives compression by calling "compress next chunk" over and over
//! with fixed-size input and output buffers. This crate serves that call
//! shape with two backends, picked per call by the host's quality level:
//!
//! - **Levels 1–5** are forwarded verbatim to a fast streaming delegate
//!   ([`delegate::FastProvider`]), driven at twice the requested level.
//! - **Levels 6–10** use a batch-only, high-ratio compressor
//!   ([`BatchCompressor`], Zopfli by default) that needs the complete input
//!   before producing anything. A [`Session`] accumulates every chunk,
//!   compresses once at end of input, then drains the result in slices that
//!   fit the host's output area.
//!
//! Output is always a gzip stream. A [`Scheme`] is the process-wide context
//! sessions are created from; see [`Session::compress`] for the per-call
//! contract and [`Session::compress_stream`] for a complete host loop.

mod batch;
mod buffer;
pub mod delegate;
pub mod error;
mod route;
mod scheme;
mod session;
mod stream;

pub use crate::batch::{BatchCompressor, ZopfliBackend};
pub use crate::buffer::GrowableBuffer;
pub use crate::route::{EffortTable, Level, Route};
pub use crate::scheme::Scheme;
pub use crate::session::{Phase, Progress, Session, Status};
pub use crate::stream::{StreamBuffers, StreamTotals};
