//! Cache-directory resolution and permission propagation.
//!
//! A cache directory is typically shared between several users and processes.
//! When the directory already exists, its group ownership and its permission
//! bits minus all execute bits are captured once, and every entry written
//! under it inherits them. A freshly created directory records nothing, and
//! entries keep the system default ownership.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Ownership and permission bits newly written cache entries inherit.
#[derive(Debug, Clone, Copy, Default)]
struct FilePolicy {
    group: Option<u32>,
    mode: Option<u32>,
}

/// A resolved cache directory.
#[derive(Debug, Clone)]
pub(crate) struct DirPolicy {
    root: PathBuf,
    policy: FilePolicy,
}

impl DirPolicy {
    /// Resolves `root`, creating it when missing.
    ///
    /// A pre-existing directory donates its group and non-execute permission
    /// bits to every entry written under it.
    pub(crate) fn resolve(root: PathBuf) -> io::Result<Self> {
        let policy = if root.is_dir() {
            capture(&root)?
        } else {
            fs::create_dir_all(&root)?;
            FilePolicy::default()
        };
        Ok(DirPolicy { root, policy })
    }

    /// The full path of the entry named `file_name`.
    pub(crate) fn entry_path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Applies the captured group and mode to a freshly written entry.
    pub(crate) fn apply(&self, path: &Path) -> io::Result<()> {
        apply(path, self.policy)
    }
}

#[cfg(unix)]
fn capture(root: &Path) -> io::Result<FilePolicy> {
    use std::os::unix::fs::MetadataExt;

    let meta = fs::metadata(root)?;
    Ok(FilePolicy {
        group: Some(meta.gid()),
        // cache entries are data, never executable
        mode: Some(meta.mode() & 0o777 & !0o111),
    })
}

#[cfg(unix)]
fn apply(path: &Path, policy: FilePolicy) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    if let Some(gid) = policy.group {
        std::os::unix::fs::chown(path, None, Some(gid))?;
    }
    if let Some(mode) = policy.mode {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn capture(_root: &Path) -> io::Result<FilePolicy> {
    Ok(FilePolicy::default())
}

#[cfg(not(unix))]
fn apply(_path: &Path, _policy: FilePolicy) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_root_is_created() {
        let basedir = tempfile::tempdir().unwrap();
        let root = basedir.path().join("cache");

        let dir = DirPolicy::resolve(root.clone()).unwrap();
        assert!(fs::metadata(&root).unwrap().is_dir());
        assert!(dir.policy.group.is_none());
        assert!(dir.policy.mode.is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_existing_root_strips_exec_bits() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        fs::set_permissions(root.path(), fs::Permissions::from_mode(0o775)).unwrap();

        let dir = DirPolicy::resolve(root.path().to_path_buf()).unwrap();
        assert_eq!(dir.policy.mode, Some(0o664));

        let entry = dir.entry_path("entry.cache");
        fs::write(&entry, b"data").unwrap();
        dir.apply(&entry).unwrap();

        let mode = fs::metadata(&entry).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode & 0o111, 0);
        assert_eq!(mode, 0o664);
    }

    #[test]
    fn test_unusable_root_is_an_error() {
        let basedir = tempfile::tempdir().unwrap();
        let file = basedir.path().join("not-a-dir");
        fs::write(&file, b"").unwrap();

        assert!(DirPolicy::resolve(file.join("cache")).is_err());
    }
}
