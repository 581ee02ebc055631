//! Derivation of cache keys from call arguments.
//!
//! A cache key doubles as the on-disk file name of the entry, so it has to be
//! a legal file name on common filesystems. Keys are built from the rendered
//! call arguments through a whitelist filter: any character outside of ASCII
//! letters, digits, space and `-_.()` is stripped, and spaces are replaced
//! with underscores.
//!
//! The full on-disk naming contract is stable for backwards compatibility:
//!
//! ```text
//! <qualified name>._[ver<tag>_]<positional args>_<name.value pairs>.cache
//! ```
//!
//! Individual arguments are rendered via [`std::fmt::Display`]. A rendering
//! longer than [`MAX_RENDERED_LEN`] characters is replaced by the hex SHA-256
//! of its text, which bounds the file name length while keeping keys unique
//! with overwhelming probability.

use std::collections::HashSet;
use std::fmt::{self, Display, Write};

use sha2::{Digest, Sha256};

/// Rendered arguments longer than this are replaced by a content hash.
pub const MAX_RENDERED_LEN: usize = 40;

/// Call arguments that know how to describe themselves to a [`KeyBuilder`].
///
/// Implementations are provided for `()` and for tuples of up to six
/// [`Display`] values, which cover purely positional calls. Functions taking
/// named parameters implement this on their own parameter struct:
///
/// ```
/// use cachable::{CacheArgs, KeyBuilder};
///
/// struct LoadArgs {
///     year: u32,
///     tmpdir: String,
/// }
///
/// impl CacheArgs for LoadArgs {
///     fn record(&self, key: &mut KeyBuilder) -> std::fmt::Result {
///         key.kwarg("year", &self.year)?;
///         key.kwarg("tmpdir", &self.tmpdir)?;
///         Ok(())
///     }
/// }
/// ```
pub trait CacheArgs {
    /// Writes this argument bundle into the builder.
    ///
    /// The recorded renderings must be stable: two semantically equal bundles
    /// have to record identical contents, or cache entries will not be found
    /// again.
    fn record(&self, key: &mut KeyBuilder) -> fmt::Result;
}

impl CacheArgs for () {
    fn record(&self, _key: &mut KeyBuilder) -> fmt::Result {
        Ok(())
    }
}

impl<A: CacheArgs + ?Sized> CacheArgs for &A {
    fn record(&self, key: &mut KeyBuilder) -> fmt::Result {
        (**self).record(key)
    }
}

macro_rules! tuple_cache_args {
    ($($name:ident),+) => {
        impl<$($name: Display),+> CacheArgs for ($($name,)+) {
            fn record(&self, key: &mut KeyBuilder) -> fmt::Result {
                #[allow(non_snake_case)]
                let ($($name,)+) = self;
                $(key.arg($name)?;)+
                Ok(())
            }
        }
    };
}

tuple_cache_args!(A);
tuple_cache_args!(A, B);
tuple_cache_args!(A, B, C);
tuple_cache_args!(A, B, C, D);
tuple_cache_args!(A, B, C, D, E);
tuple_cache_args!(A, B, C, D, E, F);

/// Collects rendered call arguments and turns them into a cache file name.
///
/// Keyword arguments are sorted by name before they are joined, so the
/// derived key does not depend on the order in which they were recorded.
#[derive(Debug, Default)]
pub struct KeyBuilder {
    positional: Vec<String>,
    keyword: Vec<(String, String)>,
}

impl KeyBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one positional argument.
    pub fn arg<T: Display + ?Sized>(&mut self, value: &T) -> Result<&mut Self, fmt::Error> {
        self.positional.push(render(value)?);
        Ok(self)
    }

    /// Records one keyword argument as a `name.value` pair.
    pub fn kwarg<T: Display + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
    ) -> Result<&mut Self, fmt::Error> {
        self.keyword.push((name.to_owned(), render(value)?));
        Ok(self)
    }

    /// Finalizes the builder into the on-disk file name for the entry.
    ///
    /// Keyword arguments whose name is in `ignore` do not contribute to the
    /// key, so calls differing only in those produce the same file name.
    pub(crate) fn finish(
        mut self,
        qual: &str,
        version: Option<&str>,
        ignore: &HashSet<String>,
    ) -> String {
        self.keyword.retain(|(name, _)| !ignore.contains(name));
        self.keyword.sort_by(|a, b| a.0.cmp(&b.0));

        let mut segments: Vec<String> = self.positional.drain(..).map(shorten).collect();
        segments.extend(
            self.keyword
                .drain(..)
                .map(|(name, value)| format!("{}.{}", shorten(name), shorten(value))),
        );

        let mut body = String::new();
        if let Some(tag) = version {
            body.push_str("ver");
            body.push_str(tag);
            body.push('_');
        }
        body.push_str(&segments.join("_"));

        format!("{}._{}.cache", qual, sanitize(&body))
    }
}

fn render<T: Display + ?Sized>(value: &T) -> Result<String, fmt::Error> {
    let mut rendered = String::new();
    write!(rendered, "{value}")?;
    Ok(rendered)
}

/// Replaces over-long renderings by their content hash.
fn shorten(rendered: String) -> String {
    if rendered.len() > MAX_RENDERED_LEN {
        format!("{:x}", Sha256::digest(rendered.as_bytes()))
    } else {
        rendered
    }
}

/// Whitelist filter making a string safe to use as a file name.
///
/// Everything outside of letters, digits, space and `-_.()` is dropped, and
/// spaces become underscores.
fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')'))
        .map(|c| if c == ' ' { '_' } else { c })
        .collect()
}
