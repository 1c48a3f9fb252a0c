//! Error types for the file manager daemon.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Main error type for the daemon.
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Configuration-related errors.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Socket-related errors.
    #[error("Socket error: {message}")]
    Socket { message: String },

    /// Channel lookup errors.
    #[error("Command error: {kind}")]
    Command { kind: CommandErrorKind },

    /// Protocol errors.
    #[error("Protocol error: {kind}")]
    Protocol { kind: ProtocolErrorKind },

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Command error kinds.
#[derive(Error, Debug)]
pub enum CommandErrorKind {
    #[error("Unknown verb: {name}")]
    UnknownVerb { name: String },
}

/// Protocol error kinds.
#[derive(Error, Debug)]
pub enum ProtocolErrorKind {
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Connection timed out")]
    ConnectionTimeout,
}

/// Failure of a single filesystem operation.
///
/// Every variant is detected at its origin and handed straight back to the
/// caller as a negative result code; nothing in the core retries.
#[derive(Error, Debug)]
pub enum OpError {
    /// Grammar violation: missing separator, empty field, bad flag.
    #[error("Malformed input: {message}")]
    MalformedInput { message: String },

    #[error("Not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Is a directory: {path}")]
    NotAFile { path: PathBuf },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf, source: io::Error },

    #[error("Directory not empty: {path}")]
    NotEmpty { path: PathBuf },

    #[error("Already exists: {path}")]
    AlreadyExists { path: PathBuf },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Resource exhausted: {message}")]
    ResourceExhausted { message: String },

    /// Underlying filesystem failure not covered above.
    #[error("I/O error on {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

impl OpError {
    /// Create a MalformedInput error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Wrap an I/O error without classifying it.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Classify an I/O error into the operation taxonomy.
    pub fn from_io(path: impl AsRef<Path>, err: io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::NotADirectory => Self::NotADirectory { path },
            io::ErrorKind::IsADirectory => Self::NotAFile { path },
            io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source: err },
            io::ErrorKind::DirectoryNotEmpty => Self::NotEmpty { path },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            io::ErrorKind::InvalidInput => Self::InvalidArgument {
                message: format!("{}: {}", path.display(), err),
            },
            io::ErrorKind::OutOfMemory => Self::ResourceExhausted {
                message: err.to_string(),
            },
            _ => Self::Io { path, source: err },
        }
    }

    /// Short stable label for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::MalformedInput { .. } => "malformed_input",
            Self::NotFound { .. } => "not_found",
            Self::NotADirectory { .. } => "not_a_directory",
            Self::NotAFile { .. } => "not_a_file",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::NotEmpty { .. } => "not_empty",
            Self::AlreadyExists { .. } => "already_exists",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::ResourceExhausted { .. } => "resource_exhausted",
            Self::Io { .. } => "io_error",
        }
    }
}

/// Result type alias for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classifies_kinds() {
        let err = OpError::from_io("/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, OpError::NotFound { .. }));

        let err = OpError::from_io("/x", io::Error::from(io::ErrorKind::DirectoryNotEmpty));
        assert!(matches!(err, OpError::NotEmpty { .. }));

        let err = OpError::from_io("/x", io::Error::from(io::ErrorKind::IsADirectory));
        assert!(matches!(err, OpError::NotAFile { .. }));

        let err = OpError::from_io("/x", io::Error::other("disk on fire"));
        assert!(matches!(err, OpError::Io { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = OpError::malformed("missing newline separator");
        assert_eq!(err.to_string(), "Malformed input: missing newline separator");
        assert_eq!(err.kind_name(), "malformed_input");
    }
}
