//! Error types for the file manager daemon.
//!
//! Provides a unified error handling system using thiserror.

mod types;

pub use types::*;
