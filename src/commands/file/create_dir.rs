//! Create directory command.

use tracing::{debug, info};

use crate::error::OpError;
use crate::fs::{resolve_dir, Filesystem};
use crate::validation::split_rooted;

use super::super::traits::Executor;
use super::super::types::{
    unexpected_command, Command, ExecutionContext, OperationResult, Verb,
};

/// Create a single directory inside an existing parent.
///
/// # Payload
///
/// `<path>`. A relative path is anchored at `/`.
///
/// # Notes
///
/// - Parents are never created
/// - Returns the payload length on success
pub struct CreateFolderCommand {
    folder_mode: u32,
}

impl CreateFolderCommand {
    pub fn new(folder_mode: u32) -> Self {
        Self { folder_mode }
    }
}

impl Default for CreateFolderCommand {
    fn default() -> Self {
        Self::new(0o755)
    }
}

impl Executor for CreateFolderCommand {
    fn verb(&self) -> Verb {
        Verb::CreateFolder
    }

    fn execute(
        &self,
        ctx: &ExecutionContext,
        fs: &dyn Filesystem,
        command: Command,
    ) -> OperationResult {
        let target_path = match command {
            Command::CreateFolder { target_path } => target_path,
            other => return Err(unexpected_command(self.verb(), &other)),
        };

        let (parent, leaf) = split_rooted(&target_path)?;
        let dir = resolve_dir(fs, &parent)?;
        let target = dir.path().join(&leaf);

        debug!(
            request_id = %ctx.request_id,
            path = %target.display(),
            mode = %format!("{:o}", self.folder_mode),
            "Creating directory"
        );

        dir.mkdir(&leaf, self.folder_mode)
            .map_err(|e| OpError::from_io(&target, e))?;

        info!(
            request_id = %ctx.request_id,
            path = %target.display(),
            "Directory created"
        );

        Ok(ctx.payload_len as u64)
    }
}
