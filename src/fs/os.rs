//! Operating system filesystem backend.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::fcntl::{renameat, AtFlags};
use nix::sys::stat::{fstatat, mkdirat, Mode, SFlag};
use nix::unistd::{unlinkat, UnlinkatFlags};

use super::{DirHandle, EntryKind, FileHandle, Filesystem, WriteMode};

/// The real filesystem of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFilesystem;

impl OsFilesystem {
    pub fn new() -> Self {
        Self
    }
}

impl Filesystem for OsFilesystem {
    fn name(&self) -> &'static str {
        "os"
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }

    fn open_dir(&self, path: &Path) -> io::Result<Box<dyn DirHandle + '_>> {
        let canonical = fs::canonicalize(path)?;
        let dir = File::open(&canonical)?;

        // fstat on the open handle, not the path
        if !dir.metadata()?.is_dir() {
            return Err(io::Error::from_raw_os_error(Errno::ENOTDIR as i32));
        }

        Ok(Box::new(OsDir {
            path: canonical,
            dir,
        }))
    }

    fn open_file(&self, path: &Path, mode: WriteMode) -> io::Result<Box<dyn FileHandle + '_>> {
        let mut options = OpenOptions::new();
        match mode {
            WriteMode::Create { mode } => {
                options.write(true).create(true).truncate(true).mode(mode);
            }
            WriteMode::Truncate => {
                options.write(true).truncate(true);
            }
            WriteMode::Append => {
                options.append(true);
            }
        }

        let file = options.open(path)?;
        Ok(Box::new(OsFile { file }))
    }
}

/// Open directory on the host filesystem.
///
/// Entry operations go through the held descriptor, so they act on the
/// directory that was opened even if its path is later replaced.
struct OsDir {
    path: PathBuf,
    dir: File,
}

impl DirHandle for OsDir {
    fn path(&self) -> &Path {
        &self.path
    }

    fn lookup(&self, leaf: &str) -> io::Result<Option<EntryKind>> {
        let stat = match fstatat(&self.dir, leaf, AtFlags::AT_SYMLINK_NOFOLLOW) {
            Ok(stat) => stat,
            Err(Errno::ENOENT) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let file_type = SFlag::from_bits_truncate(stat.st_mode) & SFlag::S_IFMT;
        let kind = if file_type == SFlag::S_IFLNK {
            EntryKind::Symlink
        } else if file_type == SFlag::S_IFDIR {
            EntryKind::Directory
        } else if file_type == SFlag::S_IFREG {
            EntryKind::File
        } else {
            EntryKind::Other
        };
        Ok(Some(kind))
    }

    fn unlink(&self, leaf: &str) -> io::Result<()> {
        unlinkat(&self.dir, leaf, UnlinkatFlags::NoRemoveDir)?;
        Ok(())
    }

    fn rmdir(&self, leaf: &str) -> io::Result<()> {
        unlinkat(&self.dir, leaf, UnlinkatFlags::RemoveDir)?;
        Ok(())
    }

    fn mkdir(&self, leaf: &str, mode: u32) -> io::Result<()> {
        mkdirat(&self.dir, leaf, Mode::from_bits_truncate(mode as _))?;
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        renameat(&self.dir, from, &self.dir, to)?;
        Ok(())
    }
}

struct OsFile {
    file: File,
}

impl FileHandle for OsFile {
    fn write_all(&mut self, data: &[u8]) -> io::Result<usize> {
        self.file.write_all(data)?;
        Ok(data.len())
    }
}
