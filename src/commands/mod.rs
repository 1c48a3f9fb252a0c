//! Command handlers module.
//!
//! Contains the payload parser, the executor registry and all executors.
//!
//! ## Adding a New Verb
//!
//! 1. Add the variant to `Verb` and `Command`, and its grammar to the parser
//! 2. Create a new file in `file/` implementing the `Executor` trait
//! 3. Register the executor in `CommandRegistry::with_modes()`

mod parser;
mod registry;
mod traits;
mod types;

pub mod file;

pub use parser::parse_command;
pub use registry::CommandRegistry;
pub use traits::Executor;
pub use types::{Command, ExecutionContext, OperationResult, Verb};
