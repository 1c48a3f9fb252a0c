//! File operation commands.
//!
//! One executor per verb:
//! - `create` - Create or truncate a file and write content
//! - `update` - Append to or overwrite an existing file
//! - `delete-file` - Remove a non-directory entry
//! - `delete-folder` - Remove an empty directory
//! - `rename-file` - Rename a file within its directory
//! - `rename-folder` - Rename a directory within its parent
//! - `create-folder` - Create a directory

mod create;
mod create_dir;
mod delete;
mod rename;
mod update;

pub use create::CreateFileCommand;
pub use create_dir::CreateFolderCommand;
pub use delete::{DeleteFileCommand, DeleteFolderCommand};
pub use rename::{RenameFileCommand, RenameFolderCommand};
pub use update::UpdateFileCommand;
