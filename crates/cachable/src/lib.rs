//! # Transparent disk-backed memoization
//!
//! `cachable` wraps expensive, deterministic functions so that each distinct
//! set of arguments is computed once and then served from a cache. It is the
//! kind of cache one puts in front of long-running data preparation in batch
//! and analysis workloads, where re-running a computation costs minutes but
//! re-reading its result costs milliseconds.
//!
//! ## Cache tiers
//!
//! A call goes through up to three stages:
//!
//! - An optional in-process **weak-reference tier** mapping cache file names
//!   to results that are still alive elsewhere in the process. A hit here
//!   skips disk I/O and deserialization entirely. The tier holds non-owning
//!   references only; entries evaporate once the last caller drops the value.
//! - The **disk tier**: one file per key in the cache directory, containing
//!   the serialized result. Entries are never expired or deleted by this
//!   crate; eviction is the operator's business.
//! - On a full miss, the **wrapped function** runs, its result is persisted,
//!   recorded in the weak tier, and returned.
//!
//! ## Keys and file names
//!
//! Keys are derived from the function's qualified name, an optional version
//! tag, and a file-name-safe rendering of the arguments; see [`KeyBuilder`]
//! for the exact contract. Two calls with semantically equal arguments always
//! derive the same key, and keyword arguments can be excluded from the key
//! via the builder's ignore set. Bumping the version tag invalidates all
//! prior entries of a function without deleting anything.
//!
//! ## Failure policy
//!
//! The cache never fails a call on its own behalf. A missing, truncated,
//! concurrently-overwritten or otherwise undecodable entry degrades to
//! recomputation; a failed write degrades to returning the unpersisted
//! result. Both are reported via `tracing::warn!` with the function's
//! qualified name, the affected file path and the underlying reason, which
//! is the sole observability surface for cache faults. Errors raised by the
//! wrapped function itself pass through unchanged.
//!
//! Multiple processes may share one cache directory. There is no locking;
//! concurrent writers to one key are last-writer-wins, and the read-failure
//! path above absorbs torn reads. A pre-existing shared directory donates
//! its group and non-execute permission bits to every entry written under
//! it, so cooperating users end up with consistently readable, never
//! executable cache files.
//!
//! ## Example
//!
//! ```no_run
//! use cachable::Memoized;
//!
//! let double = Memoized::new("double", |(n,): (u64,)| {
//!     Ok::<_, std::convert::Infallible>(2 * n)
//! });
//!
//! let x = double.call((21,)).unwrap(); // computes and persists
//! let y = double.call((21,)).unwrap(); // served from the cache
//! assert_eq!(*x, *y);
//! ```

mod config;
mod dir;
mod error;
mod key;
mod memo;
mod store;
mod timer;
mod weak;


pub use config::{CACHE_DIR_ENV, default_cache_dir};
pub use error::Error;
pub use key::{CacheArgs, KeyBuilder, MAX_RENDERED_LEN};
pub use memo::{MemoBuilder, Memoized, cachable};
pub use timer::{Instrument, Span, Stopwatch};
