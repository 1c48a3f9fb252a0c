//! Command types: verbs, parsed commands, results, and execution context.

use std::fmt;

use uuid::Uuid;

use crate::error::OpError;

/// An operation exposed on the command channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Create,
    DeleteFile,
    DeleteFolder,
    RenameFile,
    RenameFolder,
    Update,
    CreateFolder,
}

impl Verb {
    /// Every verb, in channel order.
    pub const ALL: [Verb; 7] = [
        Verb::Create,
        Verb::DeleteFile,
        Verb::DeleteFolder,
        Verb::RenameFile,
        Verb::RenameFolder,
        Verb::Update,
        Verb::CreateFolder,
    ];

    /// Name used for the endpoint and in logs.
    pub fn name(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::DeleteFile => "delete-file",
            Verb::DeleteFolder => "delete-folder",
            Verb::RenameFile => "rename-file",
            Verb::RenameFolder => "rename-folder",
            Verb::Update => "update",
            Verb::CreateFolder => "create-folder",
        }
    }

    pub fn from_name(name: &str) -> Option<Verb> {
        Verb::ALL.into_iter().find(|verb| verb.name() == name)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed command, built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create {
        target_path: String,
        content: Vec<u8>,
    },
    DeleteFile {
        target_path: String,
    },
    DeleteFolder {
        target_path: String,
    },
    RenameFile {
        current_path: String,
        new_leaf_name: String,
    },
    RenameFolder {
        current_path: String,
        new_leaf_name: String,
    },
    Update {
        target_path: String,
        content: Vec<u8>,
        overwrite: bool,
    },
    CreateFolder {
        target_path: String,
    },
}

impl Command {
    pub fn verb(&self) -> Verb {
        match self {
            Command::Create { .. } => Verb::Create,
            Command::DeleteFile { .. } => Verb::DeleteFile,
            Command::DeleteFolder { .. } => Verb::DeleteFolder,
            Command::RenameFile { .. } => Verb::RenameFile,
            Command::RenameFolder { .. } => Verb::RenameFolder,
            Command::Update { .. } => Verb::Update,
            Command::CreateFolder { .. } => Verb::CreateFolder,
        }
    }

    /// The path the command acts on.
    pub fn target(&self) -> &str {
        match self {
            Command::Create { target_path, .. }
            | Command::DeleteFile { target_path }
            | Command::DeleteFolder { target_path }
            | Command::Update { target_path, .. }
            | Command::CreateFolder { target_path } => target_path,
            Command::RenameFile { current_path, .. }
            | Command::RenameFolder { current_path, .. } => current_path,
        }
    }
}

/// Outcome of one operation: a count on success, a typed failure otherwise.
pub type OperationResult = Result<u64, OpError>;

/// Execution context for a command.
///
/// Contains metadata about the request.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Unique identifier for this request.
    pub request_id: Uuid,
    /// Verb the request arrived on.
    pub verb: Verb,
    /// Length of the raw payload in bytes.
    pub payload_len: usize,
    /// Timestamp when the request was received.
    pub timestamp: u64,
}

impl ExecutionContext {
    /// Create a new execution context.
    pub fn new(request_id: Uuid, verb: Verb, payload_len: usize, timestamp: u64) -> Self {
        Self {
            request_id,
            verb,
            payload_len,
            timestamp,
        }
    }

    /// Context for a request received now.
    pub fn now(verb: Verb, payload_len: usize) -> Self {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self::new(Uuid::new_v4(), verb, payload_len, timestamp)
    }
}

/// Error returned when a command reaches an executor for another verb.
pub(crate) fn unexpected_command(expected: Verb, command: &Command) -> OpError {
    OpError::invalid_argument(format!(
        "{} executor received a {} command",
        expected,
        command.verb()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_names_round_trip() {
        for verb in Verb::ALL {
            assert_eq!(Verb::from_name(verb.name()), Some(verb));
        }
        assert_eq!(Verb::from_name("chmod"), None);
        assert_eq!(Verb::RenameFolder.to_string(), "rename-folder");
    }

    #[test]
    fn test_command_target() {
        let command = Command::RenameFile {
            current_path: "/tmp/a".to_string(),
            new_leaf_name: "b".to_string(),
        };
        assert_eq!(command.target(), "/tmp/a");
        assert_eq!(command.verb(), Verb::RenameFile);
    }

    #[test]
    fn test_context_now() {
        let first = ExecutionContext::now(Verb::Create, 12);
        let second = ExecutionContext::now(Verb::Create, 12);
        assert_ne!(first.request_id, second.request_id);
        assert_eq!(first.payload_len, 12);
        assert!(first.timestamp > 0);
        assert!(second.timestamp >= first.timestamp);
    }
}
