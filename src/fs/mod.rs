//! Privileged filesystem capability.
//!
//! Every mutation the daemon performs goes through the [`Filesystem`] trait.
//! Two implementations exist:
//! - [`OsFilesystem`] - the real operating system filesystem
//! - [`MemoryFilesystem`] - an in-memory tree used by tests
//!
//! Directory and file handles are scoped values: dropping one releases it,
//! so every exit path of an operation gives its handles back exactly once.

mod memory;
mod os;
mod resolver;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::config::FilesystemConfig;
use crate::error::DaemonError;

pub use memory::MemoryFilesystem;
pub use os::OsFilesystem;
pub use resolver::{resolve_dir, resolve_entry, ResolvedLocation};

/// Type of a directory entry, as seen without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

impl EntryKind {
    pub fn is_dir(self) -> bool {
        self == EntryKind::Directory
    }
}

/// How a file is opened for writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create if absent, truncate if present.
    Create { mode: u32 },
    /// Existing file only, truncate to zero length.
    Truncate,
    /// Existing file only, append at the end.
    Append,
}

/// Filesystem capability used by the operation executors.
pub trait Filesystem: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Resolve a path, following every symbolic link, to its canonical form.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Open an existing directory, following symbolic links.
    fn open_dir(&self, path: &Path) -> io::Result<Box<dyn DirHandle + '_>>;

    /// Open a file for writing through normal path resolution.
    fn open_file(&self, path: &Path, mode: WriteMode) -> io::Result<Box<dyn FileHandle + '_>>;
}

/// An open directory. Entry names passed to its methods are single leaves.
pub trait DirHandle: Send {
    /// Canonical path of this directory.
    fn path(&self) -> &Path;

    /// Look up an entry without following symlinks. `None` when absent.
    fn lookup(&self, leaf: &str) -> io::Result<Option<EntryKind>>;

    /// Remove a non-directory entry.
    fn unlink(&self, leaf: &str) -> io::Result<()>;

    /// Remove an empty directory entry.
    fn rmdir(&self, leaf: &str) -> io::Result<()>;

    /// Create a directory entry.
    fn mkdir(&self, leaf: &str, mode: u32) -> io::Result<()>;

    /// Atomically rename `from` to `to` inside this directory.
    ///
    /// An existing `to` is replaced following POSIX rename rules.
    fn rename(&self, from: &str, to: &str) -> io::Result<()>;
}

/// A file opened for writing. Closed on drop.
pub trait FileHandle: Send {
    /// Write the whole buffer, returning the number of bytes written.
    fn write_all(&mut self, data: &[u8]) -> io::Result<usize>;
}

/// Build the configured filesystem backend.
pub fn from_config(config: &FilesystemConfig) -> Result<Arc<dyn Filesystem>, DaemonError> {
    let filesystem: Arc<dyn Filesystem> = match config.backend.to_lowercase().as_str() {
        "os" => Arc::new(OsFilesystem::new()),
        "memory" => Arc::new(MemoryFilesystem::new()),
        other => {
            return Err(DaemonError::Config {
                message: format!("Unknown filesystem backend '{}'", other),
            })
        }
    };

    info!(backend = filesystem.name(), "Filesystem backend selected");
    Ok(filesystem)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = FilesystemConfig::default();
        assert_eq!(from_config(&config).unwrap().name(), "os");

        config.backend = "Memory".to_string();
        assert_eq!(from_config(&config).unwrap().name(), "memory");

        config.backend = "tape".to_string();
        assert!(from_config(&config).is_err());
    }
}
