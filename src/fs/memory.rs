//! In-memory filesystem backend.
//!
//! Used for testing and for `backend = "memory"`. All data is ephemeral.
//! The backend counts live directory and file handles so callers can verify
//! that every handle acquired by an operation was released.

use std::collections::{HashMap, HashSet, VecDeque};
use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use nix::errno::Errno;

use super::{DirHandle, EntryKind, FileHandle, Filesystem, WriteMode};

/// Same bound Linux applies to nested symlink resolution.
const MAX_SYMLINK_HOPS: usize = 40;

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8> },
    Directory,
    Symlink { target: PathBuf },
}

impl Entry {
    fn kind(&self) -> EntryKind {
        match self {
            Entry::File { .. } => EntryKind::File,
            Entry::Directory => EntryKind::Directory,
            Entry::Symlink { .. } => EntryKind::Symlink,
        }
    }
}

/// In-memory filesystem.
///
/// Thread-safe via internal `RwLock`s. Paths are keyed by their canonical
/// absolute form; the root directory always exists.
#[derive(Debug)]
pub struct MemoryFilesystem {
    entries: RwLock<HashMap<PathBuf, Entry>>,
    read_only: RwLock<HashSet<PathBuf>>,
    capacity: Option<usize>,
    open_handles: AtomicUsize,
}

impl Default for MemoryFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

fn errno(errno: Errno) -> io::Error {
    io::Error::from_raw_os_error(errno as i32)
}

fn poisoned() -> io::Error {
    io::Error::other("lock poisoned")
}

fn components(path: &Path) -> VecDeque<OsString> {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_os_string()),
            Component::ParentDir => Some(OsString::from("..")),
            _ => None,
        })
        .collect()
}

/// Walk `path` from the root, expanding symlinks as they are met.
///
/// Relative paths are taken relative to the root.
fn resolve(entries: &HashMap<PathBuf, Entry>, path: &Path, follow_last: bool) -> io::Result<PathBuf> {
    let mut pending = components(path);
    let mut current = PathBuf::from("/");
    let mut hops = 0;

    while let Some(name) = pending.pop_front() {
        if name == ".." {
            current.pop();
            continue;
        }

        let candidate = current.join(&name);
        match entries.get(&candidate) {
            None => return Err(errno(Errno::ENOENT)),
            Some(Entry::Symlink { target }) if follow_last || !pending.is_empty() => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(errno(Errno::ELOOP));
                }
                if target.is_absolute() {
                    current = PathBuf::from("/");
                }
                let mut expanded = components(target);
                expanded.extend(pending.drain(..));
                pending = expanded;
            }
            Some(Entry::File { .. }) if !pending.is_empty() => {
                return Err(errno(Errno::ENOTDIR));
            }
            Some(_) => current = candidate,
        }
    }

    Ok(current)
}

/// Resolve an existing directory, failing with ENOTDIR/ENOENT otherwise.
fn resolve_directory(entries: &HashMap<PathBuf, Entry>, path: &Path) -> io::Result<PathBuf> {
    let canonical = resolve(entries, path, true)?;
    match entries.get(&canonical) {
        Some(Entry::Directory) => Ok(canonical),
        Some(_) => Err(errno(Errno::ENOTDIR)),
        None => Err(errno(Errno::ENOENT)),
    }
}

/// Find the entry an `O_CREAT` open would land on, following a symlink
/// in the final position even when it dangles.
fn creation_target(entries: &HashMap<PathBuf, Entry>, path: &Path) -> io::Result<PathBuf> {
    let mut path = path.to_path_buf();

    for _ in 0..MAX_SYMLINK_HOPS {
        let leaf = path
            .file_name()
            .ok_or_else(|| errno(Errno::EISDIR))?
            .to_os_string();
        let parent = path.parent().unwrap_or_else(|| Path::new("/"));
        let dir = resolve_directory(entries, parent)?;
        let candidate = dir.join(&leaf);

        match entries.get(&candidate) {
            Some(Entry::Symlink { target }) => {
                path = if target.is_absolute() {
                    target.clone()
                } else {
                    dir.join(target)
                };
            }
            _ => return Ok(candidate),
        }
    }

    Err(errno(Errno::ELOOP))
}

fn has_children(entries: &HashMap<PathBuf, Entry>, dir: &Path) -> bool {
    entries.keys().any(|key| key.parent() == Some(dir))
}

impl MemoryFilesystem {
    /// Create a new filesystem containing only the root directory.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(PathBuf::from("/"), Entry::Directory);
        Self {
            entries: RwLock::new(entries),
            read_only: RwLock::new(HashSet::new()),
            capacity: None,
            open_handles: AtomicUsize::new(0),
        }
    }

    /// Limit the total number of file bytes; writes beyond it fail with ENOSPC.
    pub fn with_capacity(mut self, bytes: usize) -> Self {
        self.capacity = Some(bytes);
        self
    }

    /// Number of directory and file handles currently open.
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Create a directory and all missing parents.
    pub fn create_dir_all(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let mut current = PathBuf::from("/");
        for name in components(path.as_ref()) {
            current.push(name);
            match entries.get(&current) {
                Some(Entry::Directory) => {}
                Some(_) => return Err(errno(Errno::ENOTDIR)),
                None => {
                    entries.insert(current.clone(), Entry::Directory);
                }
            }
        }
        Ok(())
    }

    /// Write a whole file, creating it if needed. The parent must exist.
    pub fn write(&self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> io::Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let target = creation_target(&entries, path.as_ref())?;
        if let Some(Entry::Directory) = entries.get(&target) {
            return Err(errno(Errno::EISDIR));
        }
        entries.insert(
            target,
            Entry::File {
                data: data.as_ref().to_vec(),
            },
        );
        Ok(())
    }

    /// Create a symbolic link at `link` pointing to `target`.
    pub fn symlink(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) -> io::Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let link = link.as_ref();
        let leaf = link.file_name().ok_or_else(|| errno(Errno::EINVAL))?;
        let dir = resolve_directory(&entries, link.parent().unwrap_or_else(|| Path::new("/")))?;
        let key = dir.join(leaf);
        if entries.contains_key(&key) {
            return Err(errno(Errno::EEXIST));
        }
        entries.insert(
            key,
            Entry::Symlink {
                target: target.as_ref().to_path_buf(),
            },
        );
        Ok(())
    }

    /// Read a whole file, following symlinks.
    pub fn read(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        let canonical = resolve(&entries, path.as_ref(), true)?;
        match entries.get(&canonical) {
            Some(Entry::File { data }) => Ok(data.clone()),
            Some(_) => Err(errno(Errno::EISDIR)),
            None => Err(errno(Errno::ENOENT)),
        }
    }

    /// Type of the entry at `path`, without following a final symlink.
    pub fn kind(&self, path: impl AsRef<Path>) -> Option<EntryKind> {
        let entries = self.entries.read().ok()?;
        let canonical = resolve(&entries, path.as_ref(), false).ok()?;
        entries.get(&canonical).map(Entry::kind)
    }

    /// Whether an entry exists at `path`.
    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.kind(path).is_some()
    }

    /// Mark a path read-only. For a directory this refuses changes to its
    /// entries; for a file it refuses opening it for write.
    pub fn set_read_only(&self, path: impl AsRef<Path>, read_only: bool) -> io::Result<()> {
        let canonical = {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            resolve(&entries, path.as_ref(), true)?
        };
        let mut set = self.read_only.write().map_err(|_| poisoned())?;
        if read_only {
            set.insert(canonical);
        } else {
            set.remove(&canonical);
        }
        Ok(())
    }

    fn check_writable(&self, path: &Path) -> io::Result<()> {
        let set = self.read_only.read().map_err(|_| poisoned())?;
        if set.contains(path) {
            return Err(errno(Errno::EACCES));
        }
        Ok(())
    }

    fn acquire(&self) {
        self.open_handles.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Filesystem for MemoryFilesystem {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        let entries = self.entries.read().map_err(|_| poisoned())?;
        resolve(&entries, path, true)
    }

    fn open_dir(&self, path: &Path) -> io::Result<Box<dyn DirHandle + '_>> {
        let canonical = {
            let entries = self.entries.read().map_err(|_| poisoned())?;
            resolve_directory(&entries, path)?
        };

        self.acquire();
        Ok(Box::new(MemoryDir {
            fs: self,
            path: canonical,
        }))
    }

    fn open_file(&self, path: &Path, mode: WriteMode) -> io::Result<Box<dyn FileHandle + '_>> {
        let mut entries = self.entries.write().map_err(|_| poisoned())?;
        let target = creation_target(&entries, path)?;

        match entries.get_mut(&target) {
            Some(Entry::Directory) => return Err(errno(Errno::EISDIR)),
            Some(Entry::Symlink { .. }) => return Err(errno(Errno::ELOOP)),
            Some(Entry::File { data }) => {
                self.check_writable(&target)?;
                if mode != WriteMode::Append {
                    data.clear();
                }
            }
            None => match mode {
                WriteMode::Create { .. } => {
                    if let Some(parent) = target.parent() {
                        self.check_writable(parent)?;
                    }
                    entries.insert(target.clone(), Entry::File { data: Vec::new() });
                }
                WriteMode::Truncate | WriteMode::Append => return Err(errno(Errno::ENOENT)),
            },
        }

        self.acquire();
        Ok(Box::new(MemoryFile {
            fs: self,
            path: target,
        }))
    }
}

/// Open directory handle into a [`MemoryFilesystem`].
///
/// Entries are addressed by the canonical path captured at open time, so a
/// directory moved after opening is not followed.
struct MemoryDir<'fs> {
    fs: &'fs MemoryFilesystem,
    path: PathBuf,
}

impl MemoryDir<'_> {
    /// The directory may have been removed since it was opened.
    fn ensure_live(&self, entries: &HashMap<PathBuf, Entry>) -> io::Result<()> {
        match entries.get(&self.path) {
            Some(Entry::Directory) => Ok(()),
            _ => Err(errno(Errno::ENOENT)),
        }
    }
}

impl Drop for MemoryDir<'_> {
    fn drop(&mut self) {
        self.fs.release();
    }
}

impl DirHandle for MemoryDir<'_> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn lookup(&self, leaf: &str) -> io::Result<Option<EntryKind>> {
        let entries = self.fs.entries.read().map_err(|_| poisoned())?;
        self.ensure_live(&entries)?;
        Ok(entries.get(&self.path.join(leaf)).map(Entry::kind))
    }

    fn unlink(&self, leaf: &str) -> io::Result<()> {
        let mut entries = self.fs.entries.write().map_err(|_| poisoned())?;
        self.ensure_live(&entries)?;

        let path = self.path.join(leaf);
        match entries.get(&path) {
            None => return Err(errno(Errno::ENOENT)),
            Some(Entry::Directory) => return Err(errno(Errno::EISDIR)),
            Some(_) => {}
        }
        self.fs.check_writable(&self.path)?;

        entries.remove(&path);
        Ok(())
    }

    fn rmdir(&self, leaf: &str) -> io::Result<()> {
        let mut entries = self.fs.entries.write().map_err(|_| poisoned())?;
        self.ensure_live(&entries)?;

        let path = self.path.join(leaf);
        match entries.get(&path) {
            None => return Err(errno(Errno::ENOENT)),
            Some(Entry::Directory) => {}
            Some(_) => return Err(errno(Errno::ENOTDIR)),
        }
        if has_children(&entries, &path) {
            return Err(errno(Errno::ENOTEMPTY));
        }
        self.fs.check_writable(&self.path)?;

        entries.remove(&path);
        Ok(())
    }

    fn mkdir(&self, leaf: &str, _mode: u32) -> io::Result<()> {
        let mut entries = self.fs.entries.write().map_err(|_| poisoned())?;
        self.ensure_live(&entries)?;

        let path = self.path.join(leaf);
        if entries.contains_key(&path) {
            return Err(errno(Errno::EEXIST));
        }
        self.fs.check_writable(&self.path)?;

        entries.insert(path, Entry::Directory);
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        let mut entries = self.fs.entries.write().map_err(|_| poisoned())?;
        self.ensure_live(&entries)?;

        let source = self.path.join(from);
        let destination = self.path.join(to);
        let source_kind = entries
            .get(&source)
            .map(Entry::kind)
            .ok_or_else(|| errno(Errno::ENOENT))?;
        if source == destination {
            return Ok(());
        }
        self.fs.check_writable(&self.path)?;

        if let Some(destination_kind) = entries.get(&destination).map(Entry::kind) {
            match (source_kind.is_dir(), destination_kind.is_dir()) {
                (true, true) if has_children(&entries, &destination) => {
                    return Err(errno(Errno::ENOTEMPTY));
                }
                (true, false) => return Err(errno(Errno::ENOTDIR)),
                (false, true) => return Err(errno(Errno::EISDIR)),
                _ => {}
            }
            entries.remove(&destination);
        }

        // Re-key the entry and everything below it.
        let moved: Vec<PathBuf> = entries
            .keys()
            .filter(|key| key.starts_with(&source))
            .cloned()
            .collect();
        for old in moved {
            let new = match old.strip_prefix(&source) {
                Ok(suffix) if suffix.as_os_str().is_empty() => destination.clone(),
                Ok(suffix) => destination.join(suffix),
                Err(_) => continue,
            };
            if let Some(entry) = entries.remove(&old) {
                entries.insert(new, entry);
            }
        }
        Ok(())
    }
}

/// File opened for writing in a [`MemoryFilesystem`].
struct MemoryFile<'fs> {
    fs: &'fs MemoryFilesystem,
    path: PathBuf,
}

impl Drop for MemoryFile<'_> {
    fn drop(&mut self) {
        self.fs.release();
    }
}

impl FileHandle for MemoryFile<'_> {
    fn write_all(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut entries = self.fs.entries.write().map_err(|_| poisoned())?;

        if let Some(capacity) = self.fs.capacity {
            let used: usize = entries
                .values()
                .map(|entry| match entry {
                    Entry::File { data } => data.len(),
                    _ => 0,
                })
                .sum();
            if used + data.len() > capacity {
                return Err(errno(Errno::ENOSPC));
            }
        }

        // An unlinked file swallows the write, as an orphaned inode would.
        if let Some(Entry::File { data: contents }) = entries.get_mut(&self.path) {
            contents.extend_from_slice(data);
        }
        Ok(data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> MemoryFilesystem {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all("/tmp/docs").unwrap();
        fs.write("/tmp/docs/a.txt", b"hello").unwrap();
        fs
    }

    #[test]
    fn test_resolve_follows_symlinks() {
        let fs = setup();
        fs.symlink("/tmp/link", "docs").unwrap();
        fs.symlink("/abs", "/tmp/link").unwrap();

        assert_eq!(
            fs.canonicalize(Path::new("/abs/a.txt")).unwrap(),
            PathBuf::from("/tmp/docs/a.txt")
        );
        assert_eq!(
            fs.canonicalize(Path::new("/tmp/link/../docs")).unwrap(),
            PathBuf::from("/tmp/docs")
        );
        assert_eq!(fs.kind("/tmp/link"), Some(EntryKind::Symlink));
    }

    #[test]
    fn test_resolve_errors() {
        let fs = setup();
        let err = fs.canonicalize(Path::new("/tmp/missing/x")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err = fs.canonicalize(Path::new("/tmp/docs/a.txt/x")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotADirectory);

        fs.symlink("/loop", "/loop").unwrap();
        let err = fs.canonicalize(Path::new("/loop")).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(Errno::ELOOP as i32));
    }

    #[test]
    fn test_handles_are_counted() {
        let fs = setup();
        {
            let dir = fs.open_dir(Path::new("/tmp")).unwrap();
            let _file = fs.open_file(Path::new("/tmp/docs/a.txt"), WriteMode::Append).unwrap();
            assert_eq!(dir.path(), Path::new("/tmp"));
            assert_eq!(fs.open_handles(), 2);
        }
        assert_eq!(fs.open_handles(), 0);

        assert!(fs.open_dir(Path::new("/tmp/docs/a.txt")).is_err());
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_rename_moves_subtree() {
        let fs = setup();
        let dir = fs.open_dir(Path::new("/tmp")).unwrap();
        dir.rename("docs", "papers").unwrap();
        drop(dir);

        assert!(!fs.exists("/tmp/docs"));
        assert_eq!(fs.read("/tmp/papers/a.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_rename_collisions() {
        let fs = setup();
        fs.write("/tmp/docs/b.txt", b"other").unwrap();
        fs.create_dir_all("/tmp/docs/sub/inner").unwrap();
        let dir = fs.open_dir(Path::new("/tmp/docs")).unwrap();

        // file over file replaces
        dir.rename("a.txt", "b.txt").unwrap();
        assert_eq!(fs.read("/tmp/docs/b.txt").unwrap(), b"hello");

        let err = dir.rename("b.txt", "sub").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::IsADirectory);

        fs.create_dir_all("/tmp/docs/other").unwrap();
        let err = dir.rename("other", "sub").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::DirectoryNotEmpty);
    }

    #[test]
    fn test_capacity_and_read_only() {
        let fs = MemoryFilesystem::new().with_capacity(4);
        fs.create_dir_all("/data").unwrap();

        let mut file = fs
            .open_file(Path::new("/data/f"), WriteMode::Create { mode: 0o644 })
            .unwrap();
        let err = file.write_all(b"too long").unwrap_err();
        assert_eq!(err.raw_os_error(), Some(Errno::ENOSPC as i32));
        drop(file);

        fs.set_read_only("/data", true).unwrap();
        let dir = fs.open_dir(Path::new("/data")).unwrap();
        let err = dir.unlink("f").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }
}
