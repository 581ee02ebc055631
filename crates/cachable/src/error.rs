//! Error taxonomy of the memoization layer.
//!
//! Only two kinds of failure ever reach the caller: a key that cannot be
//! derived, and the wrapped function's own error. Everything the cache layer
//! itself runs into on disk is absorbed and reported as a warning instead.

use std::fmt;
use std::io;

use thiserror::Error;

/// Errors surfaced to callers of a memoized function.
#[derive(Debug, Error)]
pub enum Error<E> {
    /// An argument could not be rendered into a cache key.
    ///
    /// Without a key the cache cannot proceed at all, so this one is fatal.
    #[error("could not render arguments into a cache key")]
    Key(#[from] fmt::Error),

    /// The wrapped function itself failed.
    ///
    /// Computation failures are not a caching concern; they pass through
    /// unchanged.
    #[error("computation failed")]
    Computation(E),
}

impl<E> Error<E> {
    /// Returns the wrapped function's error, if that is what failed.
    pub fn into_computation(self) -> Option<E> {
        match self {
            Error::Computation(err) => Some(err),
            Error::Key(_) => None,
        }
    }
}

/// A recoverable fault in the disk tier.
///
/// Never propagated; reported via `tracing::warn!` with the function's
/// qualified name and the affected file path.
#[derive(Debug, Error)]
pub(crate) enum CacheError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),
}
