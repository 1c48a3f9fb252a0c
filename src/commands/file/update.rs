//! Update file command.

use std::path::Path;

use tracing::{debug, info};

use crate::error::OpError;
use crate::fs::{Filesystem, WriteMode};

use super::super::traits::Executor;
use super::super::types::{
    unexpected_command, Command, ExecutionContext, OperationResult, Verb,
};

/// Write to an existing file, appending or replacing its content.
///
/// # Payload
///
/// `<path>|<content>|<flag>` where a non-zero flag truncates first.
///
/// # Notes
///
/// - Never creates the file
pub struct UpdateFileCommand;

impl Executor for UpdateFileCommand {
    fn verb(&self) -> Verb {
        Verb::Update
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        fs: &dyn Filesystem,
        command: Command,
    ) -> OperationResult {
        let (target_path, content, overwrite) = match command {
            Command::Update {
                target_path,
                content,
                overwrite,
            } => (target_path, content, overwrite),
            other => return Err(unexpected_command(self.verb(), &other)),
        };

        let mode = if overwrite {
            WriteMode::Truncate
        } else {
            WriteMode::Append
        };

        debug!(
            request_id = %ctx.request_id,
            path = %target_path,
            content_len = content.len(),
            overwrite = overwrite,
            "Updating file"
        );

        let path = Path::new(&target_path);
        let mut file = fs
            .open_file(path, mode)
            .map_err(|e| OpError::from_io(path, e))?;
        let written = file.write_all(&content).map_err(|e| OpError::io(path, e))?;
        drop(file);

        info!(
            request_id = %ctx.request_id,
            path = %target_path,
            bytes = written,
            overwrite = overwrite,
            "File updated"
        );

        Ok(written as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFilesystem;

    fn run(fs: &MemoryFilesystem, payload: &[u8]) -> OperationResult {
        let cmd = UpdateFileCommand;
        let ctx = ExecutionContext::now(Verb::Update, payload.len());
        let command = cmd.parse(payload)?;
        cmd.execute(&ctx, fs, command)
    }

    fn setup() -> MemoryFilesystem {
        let fs = MemoryFilesystem::new();
        fs.create_dir_all("/tmp/dir").unwrap();
        fs.write("/tmp/a.txt", b"hello").unwrap();
        fs
    }

    #[test]
    fn test_update_appends_in_order() {
        let fs = setup();

        assert_eq!(run(&fs, b"/tmp/a.txt|world|0").unwrap(), 5);
        assert_eq!(run(&fs, b"/tmp/a.txt|!|0\n").unwrap(), 1);
        assert_eq!(fs.read("/tmp/a.txt").unwrap(), b"helloworld!");
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_update_overwrite_keeps_last_write() {
        let fs = setup();

        assert_eq!(run(&fs, b"/tmp/a.txt|first|1").unwrap(), 5);
        assert_eq!(run(&fs, b"/tmp/a.txt|bye|1").unwrap(), 3);
        assert_eq!(fs.read("/tmp/a.txt").unwrap(), b"bye");
    }

    #[test]
    fn test_update_never_creates() {
        let fs = setup();

        let err = run(&fs, b"/tmp/missing.txt|data|0").unwrap_err();
        assert!(matches!(err, OpError::NotFound { .. }));
        assert!(!fs.exists("/tmp/missing.txt"));
        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_update_directory() {
        let fs = setup();

        let err = run(&fs, b"/tmp/dir|data|1").unwrap_err();
        assert!(matches!(err, OpError::NotAFile { .. }));
    }

    #[test]
    fn test_update_read_only_file() {
        let fs = setup();
        fs.set_read_only("/tmp/a.txt", true).unwrap();

        let err = run(&fs, b"/tmp/a.txt|data|0").unwrap_err();
        assert!(matches!(err, OpError::PermissionDenied { .. }));
        assert_eq!(fs.read("/tmp/a.txt").unwrap(), b"hello");
    }
}
