//! Executor trait definition.

use crate::error::OpError;
use crate::fs::Filesystem;

use super::parser::parse_command;
use super::types::{Command, ExecutionContext, OperationResult, Verb};

/// Core trait for all filesystem operations.
///
/// Every verb the daemon exposes has one executor implementing this trait.
///
/// # Example
///
/// ```ignore
/// pub struct TouchCommand;
///
/// impl Executor for TouchCommand {
///     fn verb(&self) -> Verb {
///         Verb::Create
///     }
///
///     fn execute(
///         &self,
///         ctx: &ExecutionContext,
///         fs: &dyn Filesystem,
///         command: Command,
///     ) -> OperationResult {
///         Ok(0)
///     }
/// }
/// ```
pub trait Executor: Send + Sync {
    /// Verb whose endpoint feeds this executor.
    fn verb(&self) -> Verb;

    /// Parse a raw payload into a command.
    ///
    /// Pure; never touches the filesystem.
    fn parse(&self, payload: &[u8]) -> Result<Command, OpError> {
        parse_command(self.verb(), payload)
    }

    /// Perform the single mutation described by `command`.
    ///
    /// Every handle acquired here must be released before returning, on
    /// success and on every error path.
    ///
    /// Note: This is called from a blocking context via `spawn_blocking`.
    fn execute(&self, ctx: &ExecutionContext, fs: &dyn Filesystem, command: Command)
        -> OperationResult;
}
