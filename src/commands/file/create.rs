//! Create file command.

use std::path::Path;

use tracing::{debug, info};

use crate::error::OpError;
use crate::fs::{Filesystem, WriteMode};

use super::super::traits::Executor;
use super::super::types::{
    unexpected_command, Command, ExecutionContext, OperationResult, Verb,
};

/// Create or truncate a file and write content to it.
///
/// # Payload
///
/// `<path>\n<content>`
///
/// # Notes
///
/// - The path is opened directly, so a symlink anywhere in it is followed,
///   including a dangling one in the final position
/// - Every failure is reported as an I/O error carrying the OS errno
pub struct CreateFileCommand {
    file_mode: u32,
}

impl CreateFileCommand {
    pub fn new(file_mode: u32) -> Self {
        Self { file_mode }
    }
}

impl Default for CreateFileCommand {
    fn default() -> Self {
        Self::new(0o644)
    }
}

impl Executor for CreateFileCommand {
    fn verb(&self) -> Verb {
        Verb::Create
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        fs: &dyn Filesystem,
        command: Command,
    ) -> OperationResult {
        let (target_path, content) = match command {
            Command::Create {
                target_path,
                content,
            } => (target_path, content),
            other => return Err(unexpected_command(self.verb(), &other)),
        };

        debug!(
            request_id = %ctx.request_id,
            path = %target_path,
            content_len = content.len(),
            "Creating file"
        );

        let path = Path::new(&target_path);
        let mut file = fs
            .open_file(path, WriteMode::Create { mode: self.file_mode })
            .map_err(|e| OpError::io(path, e))?;
        let written = file.write_all(&content).map_err(|e| OpError::io(path, e))?;
        drop(file);

        info!(
            request_id = %ctx.request_id,
            path = %target_path,
            bytes = written,
            "File created"
        );

        Ok(written as u64)
    }
}
