//! Safe path resolution.
//!
//! Turns a caller-supplied path into an open parent directory plus a single
//! leaf name. Every symlink is followed, including one in the final
//! position, so the entry acted on is the one the path finally names.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DirHandle, Filesystem};
use crate::error::OpError;

/// An open parent directory and the leaf to act on inside it.
///
/// Dropping the location releases the directory handle.
pub struct ResolvedLocation<'fs> {
    dir: Box<dyn DirHandle + 'fs>,
    leaf: String,
}

impl<'fs> ResolvedLocation<'fs> {
    pub fn new(dir: Box<dyn DirHandle + 'fs>, leaf: impl Into<String>) -> Self {
        Self {
            dir,
            leaf: leaf.into(),
        }
    }

    pub fn dir(&self) -> &dyn DirHandle {
        self.dir.as_ref()
    }

    pub fn leaf(&self) -> &str {
        &self.leaf
    }

    /// Canonical parent joined with the leaf.
    pub fn target_path(&self) -> PathBuf {
        self.dir.path().join(&self.leaf)
    }
}

impl std::fmt::Debug for ResolvedLocation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedLocation")
            .field("dir", &self.dir.path())
            .field("leaf", &self.leaf)
            .finish()
    }
}

/// Open a directory, following symlinks at every level.
pub fn resolve_dir<'fs>(
    fs: &'fs dyn Filesystem,
    path: &str,
) -> Result<Box<dyn DirHandle + 'fs>, OpError> {
    fs.open_dir(Path::new(path))
        .map_err(|e| OpError::from_io(path, e))
}

/// Resolve an existing entry to its parent directory and leaf.
///
/// Symlinks in the path are followed before the split, so the entry
/// operated on is the canonical one. Resolving the root is rejected.
pub fn resolve_entry<'fs>(
    fs: &'fs dyn Filesystem,
    path: &str,
) -> Result<ResolvedLocation<'fs>, OpError> {
    let canonical = fs
        .canonicalize(Path::new(path))
        .map_err(|e| OpError::from_io(path, e))?;

    let (parent, leaf) = match (canonical.parent(), canonical.file_name()) {
        (Some(parent), Some(leaf)) => (parent, leaf),
        _ => {
            return Err(OpError::invalid_argument(format!(
                "refusing to operate on {}",
                canonical.display()
            )))
        }
    };
    let leaf = leaf
        .to_str()
        .ok_or_else(|| OpError::malformed("path is not valid UTF-8"))?
        .to_string();

    let dir = fs
        .open_dir(parent)
        .map_err(|e| OpError::from_io(parent, e))?;

    debug!(
        requested = path,
        parent = %parent.display(),
        leaf = %leaf,
        "Resolved entry"
    );
    Ok(ResolvedLocation::new(dir, leaf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{EntryKind, MemoryFilesystem};

    fn setup() -> MemoryFilesystem {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all("/srv/www").unwrap();
        fs.write("/srv/www/index.html", b"<html>").unwrap();
        fs.symlink("/web", "/srv/www").unwrap();
        fs
    }

    #[test]
    fn test_resolve_entry_follows_intermediate_links() {
        let fs = setup();
        let location = resolve_entry(&fs, "/web/index.html").unwrap();
        assert_eq!(location.dir().path(), Path::new("/srv/www"));
        assert_eq!(location.leaf(), "index.html");
        assert_eq!(location.target_path(), PathBuf::from("/srv/www/index.html"));
        assert_eq!(
            location.dir().lookup(location.leaf()).unwrap(),
            Some(EntryKind::File)
        );
    }

    #[test]
    fn test_resolve_entry_follows_final_link() {
        let fs = setup();
        fs.symlink("/srv/home", "/srv/www/index.html").unwrap();

        let location = resolve_entry(&fs, "/srv/home").unwrap();
        assert_eq!(location.target_path(), PathBuf::from("/srv/www/index.html"));

        let location = resolve_entry(&fs, "/web").unwrap();
        assert_eq!(location.dir().path(), Path::new("/srv"));
        assert_eq!(location.leaf(), "www");
    }

    #[test]
    fn test_resolve_entry_errors() {
        let fs = setup();

        let err = resolve_entry(&fs, "/srv/missing").unwrap_err();
        assert!(matches!(err, OpError::NotFound { .. }));

        let err = resolve_entry(&fs, "/srv/www/index.html/x").unwrap_err();
        assert!(matches!(err, OpError::NotADirectory { .. }));

        let err = resolve_entry(&fs, "/").unwrap_err();
        assert!(matches!(err, OpError::InvalidArgument { .. }));

        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_resolve_dir() {
        let fs = setup();
        {
            let dir = resolve_dir(&fs, "/web").unwrap();
            assert_eq!(dir.path(), Path::new("/srv/www"));
            assert_eq!(fs.open_handles(), 1);
        }
        assert_eq!(fs.open_handles(), 0);

        let err = resolve_dir(&fs, "/srv/www/index.html").err().unwrap();
        assert!(matches!(err, OpError::NotADirectory { .. }));
    }
}
