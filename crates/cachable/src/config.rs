//! Resolution of the default cache root.

use std::env;
use std::path::PathBuf;

/// Environment variable overriding the default cache root.
pub const CACHE_DIR_ENV: &str = "CACHABLE_CACHE_DIR";

/// The cache root used when none is configured explicitly.
///
/// Resolution order: the [`CACHE_DIR_ENV`] environment variable, the
/// per-user OS cache directory, and the system temp directory as a last
/// resort. The returned directory is not created here; that happens lazily
/// when a memoized function is built.
pub fn default_cache_dir() -> PathBuf {
    if let Some(dir) = env::var_os(CACHE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("cachable")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ends_in_crate_dir() {
        if env::var_os(CACHE_DIR_ENV).is_none() {
            assert!(default_cache_dir().ends_with("cachable"));
        }
    }
}
