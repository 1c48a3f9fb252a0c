//! Delete file and delete folder commands.
//!
//! Both resolve the full path, following symlinks, then remove the entry
//! through its parent directory handle.

use tracing::{debug, info};

use crate::error::OpError;
use crate::fs::{resolve_entry, EntryKind, Filesystem};

use super::super::traits::Executor;
use super::super::types::{
    unexpected_command, Command, ExecutionContext, OperationResult, Verb,
};

/// Delete a non-directory entry.
///
/// # Payload
///
/// `<path>`, taken verbatim.
pub struct DeleteFileCommand;

impl Executor for DeleteFileCommand {
    fn verb(&self) -> Verb {
        Verb::DeleteFile
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        fs: &dyn Filesystem,
        command: Command,
    ) -> OperationResult {
        let target_path = match command {
            Command::DeleteFile { target_path } => target_path,
            other => return Err(unexpected_command(self.verb(), &other)),
        };

        let location = resolve_entry(fs, &target_path)?;
        let target = location.target_path();

        match location.dir().lookup(location.leaf()) {
            Ok(Some(EntryKind::Directory)) => return Err(OpError::NotAFile { path: target }),
            Ok(Some(_)) => {}
            Ok(None) => return Err(OpError::NotFound { path: target }),
            Err(e) => return Err(OpError::from_io(&target, e)),
        }

        debug!(
            request_id = %ctx.request_id,
            path = %target.display(),
            "Unlinking file"
        );

        location
            .dir()
            .unlink(location.leaf())
            .map_err(|e| OpError::from_io(&target, e))?;

        info!(
            request_id = %ctx.request_id,
            path = %target.display(),
            "File deleted"
        );

        Ok(0)
    }
}

/// Delete an empty directory.
///
/// # Payload
///
/// `<path>`, taken verbatim.
///
/// # Notes
///
/// - Never recursive; a non-empty directory is refused
pub struct DeleteFolderCommand;

impl Executor for DeleteFolderCommand {
    fn verb(&self) -> Verb {
        Verb::DeleteFolder
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        fs: &dyn Filesystem,
        command: Command,
    ) -> OperationResult {
        let target_path = match command {
            Command::DeleteFolder { target_path } => target_path,
            other => return Err(unexpected_command(self.verb(), &other)),
        };

        let location = resolve_entry(fs, &target_path)?;
        let target = location.target_path();

        match location.dir().lookup(location.leaf()) {
            Ok(Some(EntryKind::Directory)) => {}
            Ok(Some(_)) => return Err(OpError::NotADirectory { path: target }),
            Ok(None) => return Err(OpError::NotFound { path: target }),
            Err(e) => return Err(OpError::from_io(&target, e)),
        }

        debug!(
            request_id = %ctx.request_id,
            path = %target.display(),
            "Removing directory"
        );

        location
            .dir()
            .rmdir(location.leaf())
            .map_err(|e| OpError::from_io(&target, e))?;

        info!(
            request_id = %ctx.request_id,
            path = %target.display(),
            "Directory deleted"
        );

        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{MemoryFilesystem, OsFilesystem};
    use tempfile::TempDir;

    fn run(executor: &dyn Executor, fs: &dyn Filesystem, payload: &[u8]) -> OperationResult {
        let ctx = ExecutionContext::now(executor.verb(), payload.len());
        let command = executor.parse(payload)?;
        executor.execute(&ctx, fs, command)
    }

    fn setup() -> MemoryFilesystem {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all("/tmp/empty").unwrap();
        fs.create_dir_all("/tmp/full/inner").unwrap();
        fs.write("/tmp/a.txt", b"hello").unwrap();
        fs
    }

    #[test]
    fn test_delete_file() {
        let fs = setup();

        assert_eq!(run(&DeleteFileCommand, &fs, b"/tmp/a.txt").unwrap(), 0);
        assert!(!fs.exists("/tmp/a.txt"));

        let err = run(&DeleteFileCommand, &fs, b"/tmp/a.txt").unwrap_err();
        assert!(matches!(err, OpError::NotFound { .. }));
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_delete_file_on_directory() {
        let fs = setup();

        let err = run(&DeleteFileCommand, &fs, b"/tmp/empty").unwrap_err();
        assert!(matches!(err, OpError::NotAFile { .. }));
        assert!(fs.exists("/tmp/empty"));
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_delete_file_follows_symlink() {
        let fs = setup();
        fs.symlink("/tmp/link", "/tmp/a.txt").unwrap();

        assert_eq!(run(&DeleteFileCommand, &fs, b"/tmp/link").unwrap(), 0);
        assert!(!fs.exists("/tmp/a.txt"));
    }

    #[test]
    fn test_delete_file_payload_not_trimmed() {
        let fs = setup();

        let err = run(&DeleteFileCommand, &fs, b"/tmp/a.txt\n").unwrap_err();
        assert!(matches!(err, OpError::NotFound { .. }));
        assert!(fs.exists("/tmp/a.txt"));
    }

    #[test]
    fn test_delete_folder() {
        let fs = setup();

        assert_eq!(run(&DeleteFolderCommand, &fs, b"/tmp/empty").unwrap(), 0);
        assert!(!fs.exists("/tmp/empty"));
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_delete_folder_errors() {
        let fs = setup();

        let err = run(&DeleteFolderCommand, &fs, b"/tmp/full").unwrap_err();
        assert!(matches!(err, OpError::NotEmpty { .. }));
        assert!(fs.exists("/tmp/full/inner"));

        let err = run(&DeleteFolderCommand, &fs, b"/tmp/a.txt").unwrap_err();
        assert!(matches!(err, OpError::NotADirectory { .. }));

        let err = run(&DeleteFolderCommand, &fs, b"/tmp/gone").unwrap_err();
        assert!(matches!(err, OpError::NotFound { .. }));

        let err = run(&DeleteFolderCommand, &fs, b"/").unwrap_err();
        assert!(matches!(err, OpError::InvalidArgument { .. }));

        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_delete_permission_denied() {
        let fs = setup();
        fs.set_read_only("/tmp", true).unwrap();

        let err = run(&DeleteFileCommand, &fs, b"/tmp/a.txt").unwrap_err();
        assert!(matches!(err, OpError::PermissionDenied { .. }));
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_delete_on_disk() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        let dir = temp.path().join("sub");
        std::fs::write(&file, b"x").unwrap();
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("keep"), b"y").unwrap();

        let fs = OsFilesystem::new();
        let payload = file.to_str().unwrap().as_bytes();
        assert_eq!(run(&DeleteFileCommand, &fs, payload).unwrap(), 0);
        assert!(!file.exists());

        let payload = dir.to_str().unwrap().as_bytes();
        let err = run(&DeleteFolderCommand, &fs, payload).unwrap_err();
        assert!(matches!(err, OpError::NotEmpty { .. }));

        std::fs::remove_file(dir.join("keep")).unwrap();
        assert_eq!(run(&DeleteFolderCommand, &fs, payload).unwrap(), 0);
        assert!(!dir.exists());
    }
}
