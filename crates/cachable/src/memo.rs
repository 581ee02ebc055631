//! The memoization wrapper tying the cache tiers together.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::default_cache_dir;
use crate::dir::DirPolicy;
use crate::error::Error;
use crate::key::{CacheArgs, KeyBuilder};
use crate::store::Store;
use crate::timer::{Instrument, Span, Stopwatch};
use crate::weak::WeakCache;

/// Configuration builder for [`Memoized`].
///
/// Created via [`cachable`](crate::cachable()) or [`MemoBuilder::new`]. All
/// settings are optional; [`build`](MemoBuilder::build) never fails. When the
/// cache directory turns out to be unusable, the disk tier is disabled with a
/// warning and the wrapper degrades to "always recompute, never persist".
pub struct MemoBuilder {
    qual: String,
    version: Option<String>,
    cache_dir: Option<PathBuf>,
    keep_weak_ref: bool,
    ignore: HashSet<String>,
    verbose: bool,
    hook: Arc<dyn Instrument>,
}

impl MemoBuilder {
    /// Starts a builder for the function with the given qualified name.
    ///
    /// The name becomes the file-name prefix of every entry this function
    /// writes, which is what disambiguates functions sharing one cache
    /// directory. Use a stable, module-qualified name like `"load::shapes"`.
    pub fn new(qual: impl Into<String>) -> Self {
        MemoBuilder {
            qual: qual.into(),
            version: None,
            cache_dir: None,
            keep_weak_ref: false,
            ignore: HashSet::new(),
            verbose: false,
            hook: Arc::new(Stopwatch),
        }
    }

    /// Tags all entries with a version.
    ///
    /// Bumping the tag changes every derived file name, which invalidates all
    /// prior entries of this function without touching the files themselves.
    pub fn version(mut self, tag: impl fmt::Display) -> Self {
        self.version = Some(tag.to_string());
        self
    }

    /// Uses `dir` as the cache directory instead of the default root.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Additionally keeps an in-process weak reference to each result.
    ///
    /// Repeated hits are then served without disk I/O or deserialization for
    /// as long as some caller still holds the previous result.
    pub fn keep_weak_ref(mut self, keep: bool) -> Self {
        self.keep_weak_ref = keep;
        self
    }

    /// Excludes the named keyword arguments from key derivation.
    ///
    /// Calls differing only in ignored arguments share one cache entry.
    pub fn ignore<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Reports cache hits and computation timings via the instrumentation
    /// hook.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replaces the default [`Stopwatch`] instrumentation hook.
    pub fn hook(mut self, hook: Arc<dyn Instrument>) -> Self {
        self.hook = hook;
        self
    }

    /// Wraps `func` with the configured cache.
    pub fn build<A, T, E, F>(self, func: F) -> Memoized<A, T, E, F>
    where
        A: CacheArgs,
        T: Serialize + DeserializeOwned,
        F: Fn(A) -> Result<T, E>,
    {
        let root = self.cache_dir.unwrap_or_else(default_cache_dir);
        let store = match DirPolicy::resolve(root) {
            Ok(dir) => Some(Store::new(dir)),
            Err(err) => {
                tracing::warn!(
                    function = %self.qual,
                    error = %err,
                    "cache directory unusable, persistence disabled"
                );
                None
            }
        };

        Memoized {
            func,
            qual: self.qual,
            version: self.version,
            ignore: self.ignore,
            verbose: self.verbose,
            hook: self.hook,
            store,
            weak: self.keep_weak_ref.then(WeakCache::new),
            _args: PhantomData,
        }
    }
}

/// Starts a [`MemoBuilder`] for the function with the given qualified name.
///
/// This is the configuration-object entry point; [`Memoized::new`] is the
/// zero-configuration one.
///
/// ```no_run
/// let double = cachable::cachable("double")
///     .cache_dir("/tmp/c")
///     .build(|(n,): (u64,)| Ok::<_, std::convert::Infallible>(2 * n));
///
/// assert_eq!(*double.call((21,)).unwrap(), 42);
/// ```
pub fn cachable(qual: impl Into<String>) -> MemoBuilder {
    MemoBuilder::new(qual)
}

/// A disk-backed memoization of one function.
///
/// Each call derives a cache key from the arguments, consults the optional
/// weak-reference tier and then the disk tier, and only invokes the wrapped
/// function on a full miss, persisting the result afterwards. Results are
/// returned as [`Arc<T>`] so the weak tier can track their lifetime.
///
/// Cache faults never fail a call; they degrade to recomputation (reads) or
/// to an unpersisted result (writes), reported via `tracing::warn!`.
pub struct Memoized<A, T, E, F> {
    func: F,
    qual: String,
    version: Option<String>,
    ignore: HashSet<String>,
    verbose: bool,
    hook: Arc<dyn Instrument>,
    store: Option<Store>,
    weak: Option<WeakCache<T>>,
    _args: PhantomData<fn(A) -> E>,
}

impl<A, T, E, F> Memoized<A, T, E, F>
where
    A: CacheArgs,
    T: Serialize + DeserializeOwned,
    F: Fn(A) -> Result<T, E>,
{
    /// Wraps `func` with a cache in the default cache root, without a version
    /// tag or weak-reference tier.
    pub fn new(qual: impl Into<String>, func: F) -> Self {
        MemoBuilder::new(qual).build(func)
    }

    /// Returns the cached result for `args`, computing and persisting it on
    /// a full miss.
    pub fn call(&self, args: A) -> Result<Arc<T>, Error<E>> {
        self.invoke(args, false)
    }

    /// Recomputes unconditionally, bypassing both cache tiers, and
    /// overwrites the prior entry.
    pub fn recompute(&self, args: A) -> Result<Arc<T>, Error<E>> {
        self.invoke(args, true)
    }

    /// The on-disk file name `args` resolves to.
    pub fn file_name(&self, args: &A) -> Result<String, fmt::Error> {
        let mut key = KeyBuilder::new();
        args.record(&mut key)?;
        Ok(key.finish(&self.qual, self.version.as_deref(), &self.ignore))
    }

    fn invoke(&self, args: A, recompute: bool) -> Result<Arc<T>, Error<E>> {
        let file_name = self.file_name(&args)?;

        if !recompute {
            if let Some(weak) = &self.weak {
                if let Some(hit) = weak.get(&file_name) {
                    return Ok(hit);
                }
            }

            if let Some(store) = &self.store {
                if store.contains(&file_name) {
                    let mut scope = self.scope(format_args!(
                        "Serving call to {} from file {}",
                        self.qual, file_name
                    ));
                    match store.read::<T>(&self.qual, &file_name) {
                        Some(value) => {
                            let value = Arc::new(value);
                            if let Some(weak) = &self.weak {
                                weak.insert(file_name, &value);
                            }
                            return Ok(value);
                        }
                        // the entry turned out to be unreadable; close the
                        // scope as failed and fall through to recomputation
                        None => {
                            if let Some(scope) = scope.as_mut() {
                                scope.fail();
                            }
                        }
                    }
                }
            }
        }

        let value = {
            let _scope = self.scope(format_args!(
                "Caching call to {} in {}",
                self.qual, file_name
            ));
            let value = (self.func)(args).map_err(Error::Computation)?;
            if let Some(store) = &self.store {
                store.write(&self.qual, &file_name, &value);
            }
            value
        };

        let value = Arc::new(value);
        if let Some(weak) = &self.weak {
            weak.insert(file_name, &value);
        }
        Ok(value)
    }

    fn scope(&self, label: fmt::Arguments<'_>) -> Option<Box<dyn Span>> {
        self.verbose.then(|| self.hook.enter(label.to_string()))
    }
}
