//! Rename file and rename folder commands.
//!
//! The new name is a single leaf placed in the source's own parent
//! directory; entries never move between directories. An existing entry
//! under the new name is replaced with the usual rename rules.

use tracing::{debug, info};

use crate::error::OpError;
use crate::fs::{resolve_entry, EntryKind, Filesystem};
use crate::validation::split_parent;

use super::super::traits::Executor;
use super::super::types::{
    unexpected_command, Command, ExecutionContext, OperationResult, Verb,
};

/// Rename an entry within its parent after checking its type.
fn rename_in_parent(
    ctx: &ExecutionContext,
    fs: &dyn Filesystem,
    current_path: &str,
    new_leaf_name: &str,
    want_dir: bool,
) -> OperationResult {
    let (textual_parent, _) = split_parent(current_path)?;

    let location = resolve_entry(fs, current_path)?;
    let source = location.target_path();

    match location.dir().lookup(location.leaf()) {
        Ok(Some(kind)) if kind.is_dir() == want_dir => {}
        Ok(Some(EntryKind::Directory)) => return Err(OpError::NotAFile { path: source }),
        Ok(Some(_)) => return Err(OpError::NotADirectory { path: source }),
        Ok(None) => return Err(OpError::NotFound { path: source }),
        Err(e) => return Err(OpError::from_io(&source, e)),
    }

    let candidate = if textual_parent == "/" {
        format!("/{}", new_leaf_name)
    } else {
        format!("{}/{}", textual_parent, new_leaf_name)
    };
    let destination = location.dir().path().join(new_leaf_name);

    let existing = location
        .dir()
        .lookup(new_leaf_name)
        .map_err(|e| OpError::from_io(&destination, e))?;

    debug!(
        request_id = %ctx.request_id,
        source = %source.display(),
        candidate = %candidate,
        replaces = ?existing,
        "Renaming entry"
    );

    location
        .dir()
        .rename(location.leaf(), new_leaf_name)
        .map_err(|e| OpError::from_io(&destination, e))?;

    info!(
        request_id = %ctx.request_id,
        from = %source.display(),
        to = %destination.display(),
        "Entry renamed"
    );

    Ok(ctx.payload_len as u64)
}

/// Rename a non-directory entry.
///
/// # Payload
///
/// `<path>\n<new_leaf_name>`
///
/// Returns the payload length on success.
pub struct RenameFileCommand;

impl Executor for RenameFileCommand {
    fn verb(&self) -> Verb {
        Verb::RenameFile
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        fs: &dyn Filesystem,
        command: Command,
    ) -> OperationResult {
        match command {
            Command::RenameFile {
                current_path,
                new_leaf_name,
            } => rename_in_parent(ctx, fs, &current_path, &new_leaf_name, false),
            other => Err(unexpected_command(self.verb(), &other)),
        }
    }
}

/// Rename a directory.
///
/// # Payload
///
/// `<path>\n<new_leaf_name>`
///
/// Returns the payload length on success.
pub struct RenameFolderCommand;

impl Executor for RenameFolderCommand {
    fn verb(&self) -> Verb {
        Verb::RenameFolder
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        fs: &dyn Filesystem,
        command: Command,
    ) -> OperationResult {
        match command {
            Command::RenameFolder {
                current_path,
                new_leaf_name,
            } => rename_in_parent(ctx, fs, &current_path, &new_leaf_name, true),
            other => Err(unexpected_command(self.verb(), &other)),
        }
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
        fs.create_dir_all("/tmp/docs/inner").unwrap();
        fs.create_dir_all("/tmp/spare").unwrap();
        fs.write("/tmp/a.txt", b"alpha").unwrap();
        fs.write("/tmp/docs/inner/note", b"note").unwrap();
        fs
    }

    #[test]
    fn test_rename_file_returns_payload_length() {
        let fs = setup();
        let payload = b"/tmp/a.txt\nb.txt";

        assert_eq!(
            run(&RenameFileCommand, &fs, payload).unwrap(),
            payload.len() as u64
        );
        assert!(!fs.exists("/tmp/a.txt"));
        assert_eq!(fs.read("/tmp/b.txt").unwrap(), b"alpha");
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_rename_file_replaces_existing() {
        let fs = setup();
        fs.write("/tmp/b.txt", b"old").unwrap();

        run(&RenameFileCommand, &fs, b"/tmp/a.txt\nb.txt\n").unwrap();
        assert_eq!(fs.read("/tmp/b.txt").unwrap(), b"alpha");
        assert!(!fs.exists("/tmp/a.txt"));
    }

    #[test]
    fn test_rename_to_same_name() {
        let fs = setup();

        assert!(run(&RenameFileCommand, &fs, b"/tmp/a.txt\na.txt").is_ok());
        assert_eq!(fs.read("/tmp/a.txt").unwrap(), b"alpha");
    }

    #[test]
    fn test_rename_type_checks() {
        let fs = setup();

        let err = run(&RenameFileCommand, &fs, b"/tmp/docs\nx").unwrap_err();
        assert!(matches!(err, OpError::NotAFile { .. }));

        let err = run(&RenameFolderCommand, &fs, b"/tmp/a.txt\nx").unwrap_err();
        assert!(matches!(err, OpError::NotADirectory { .. }));

        let err = run(&RenameFileCommand, &fs, b"/tmp/a.txt\nspare").unwrap_err();
        assert!(matches!(err, OpError::NotAFile { .. }));
        assert!(fs.exists("/tmp/a.txt"));

        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_rename_folder_moves_contents() {
        let fs = setup();

        run(&RenameFolderCommand, &fs, b"/tmp/docs\npapers").unwrap();
        assert_eq!(fs.read("/tmp/papers/inner/note").unwrap(), b"note");
        assert!(!fs.exists("/tmp/docs"));
    }

    #[test]
    fn test_rename_folder_over_non_empty() {
        let fs = setup();

        let err = run(&RenameFolderCommand, &fs, b"/tmp/spare\ndocs").unwrap_err();
        assert!(matches!(err, OpError::NotEmpty { .. }));
        assert!(fs.exists("/tmp/spare"));
    }

    #[test]
    fn test_rename_errors() {
        let fs = setup();

        let err = run(&RenameFileCommand, &fs, b"/tmp/missing\nx").unwrap_err();
        assert!(matches!(err, OpError::NotFound { .. }));

        let err = run(&RenameFileCommand, &fs, b"a.txt\nb.txt").unwrap_err();
        assert!(matches!(err, OpError::InvalidArgument { .. }));

        let err = run(&RenameFileCommand, &fs, b"/tmp/a.txt\nsub/b.txt").unwrap_err();
        assert!(matches!(err, OpError::MalformedInput { .. }));

        fs.set_read_only("/tmp", true).unwrap();
        let err = run(&RenameFileCommand, &fs, b"/tmp/a.txt\nb.txt").unwrap_err();
        assert!(matches!(err, OpError::PermissionDenied { .. }));

        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_rename_on_disk() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("old");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(dir.join("f"), b"data").unwrap();

        let fs = OsFilesystem::new();
        let payload = format!("{}\nnew", dir.display());
        run(&RenameFolderCommand, &fs, payload.as_bytes()).unwrap();

        assert!(!dir.exists());
        assert_eq!(std::fs::read(temp.path().join("new/f")).unwrap(), b"data");
    }
}
