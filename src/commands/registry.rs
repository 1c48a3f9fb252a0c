//! Command registry for dispatching payloads to executors.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::FilesystemConfig;
use crate::error::{CommandErrorKind, DaemonError, DaemonResult};
use crate::fs::Filesystem;

use super::file::{
    CreateFileCommand, CreateFolderCommand, DeleteFileCommand, DeleteFolderCommand,
    RenameFileCommand, RenameFolderCommand, UpdateFileCommand,
};
use super::traits::Executor;
use super::types::{ExecutionContext, OperationResult, Verb};

/// Registry of all executors, bound to one filesystem.
#[derive(Clone)]
pub struct CommandRegistry {
    executors: HashMap<Verb, Arc<dyn Executor>>,
    filesystem: Arc<dyn Filesystem>,
}

impl CommandRegistry {
    /// Create a registry with every built-in executor.
    pub fn new(
        filesystem: Arc<dyn Filesystem>,
        config: &FilesystemConfig,
    ) -> DaemonResult<Self> {
        let file_mode = config.file_mode()?;
        let folder_mode = config.folder_mode()?;
        Ok(Self::with_modes(filesystem, file_mode, folder_mode))
    }

    /// Create a registry using the default creation modes.
    pub fn with_filesystem(filesystem: Arc<dyn Filesystem>) -> Self {
        Self::with_modes(filesystem, 0o644, 0o755)
    }

    fn with_modes(filesystem: Arc<dyn Filesystem>, file_mode: u32, folder_mode: u32) -> Self {
        let mut registry = Self {
            executors: HashMap::new(),
            filesystem,
        };

        registry.register(Arc::new(CreateFileCommand::new(file_mode)));
        registry.register(Arc::new(UpdateFileCommand));
        registry.register(Arc::new(DeleteFileCommand));
        registry.register(Arc::new(DeleteFolderCommand));
        registry.register(Arc::new(RenameFileCommand));
        registry.register(Arc::new(RenameFolderCommand));
        registry.register(Arc::new(CreateFolderCommand::new(folder_mode)));

        info!(
            count = registry.executors.len(),
            backend = registry.filesystem.name(),
            "Command registry initialized"
        );

        registry
    }

    /// Register an executor.
    fn register(&mut self, executor: Arc<dyn Executor>) {
        let verb = executor.verb();
        debug!(verb = %verb, "Registering executor");
        self.executors.insert(verb, executor);
    }

    /// Get an executor by verb.
    pub fn get(&self, verb: Verb) -> Option<Arc<dyn Executor>> {
        self.executors.get(&verb).cloned()
    }

    /// Run one payload through parse and execute.
    ///
    /// Each step is logged against the request id; nothing is retried.
    pub fn dispatch(
        &self,
        ctx: &ExecutionContext,
        payload: &[u8],
    ) -> DaemonResult<OperationResult> {
        let executor = self.executors.get(&ctx.verb).ok_or_else(|| DaemonError::Command {
            kind: CommandErrorKind::UnknownVerb {
                name: ctx.verb.to_string(),
            },
        })?;

        debug!(
            request_id = %ctx.request_id,
            verb = %ctx.verb,
            payload_len = ctx.payload_len,
            received_at = ctx.timestamp,
            "Command received"
        );

        let command = match executor.parse(payload) {
            Ok(command) => command,
            Err(e) => {
                warn!(
                    request_id = %ctx.request_id,
                    verb = %ctx.verb,
                    error = %e,
                    "Command rejected"
                );
                return Ok(Err(e));
            }
        };

        debug!(
            request_id = %ctx.request_id,
            verb = %ctx.verb,
            target = command.target(),
            "Command parsed"
        );

        let result = executor.execute(ctx, self.filesystem.as_ref(), command);
        match &result {
            Ok(value) => debug!(
                request_id = %ctx.request_id,
                verb = %ctx.verb,
                result = value,
                "Command committed"
            ),
            Err(e) => warn!(
                request_id = %ctx.request_id,
                verb = %ctx.verb,
                kind = e.kind_name(),
                error = %e,
                "Command failed"
            ),
        }

        Ok(result)
    }

    /// List all registered verbs.
    pub fn list_verbs(&self) -> Vec<Verb> {
        Verb::ALL
            .into_iter()
            .filter(|verb| self.executors.contains_key(verb))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OpError;
    use crate::fs::MemoryFilesystem;

    fn dispatch(registry: &CommandRegistry, verb: Verb, payload: &[u8]) -> OperationResult {
        let ctx = ExecutionContext::now(verb, payload.len());
        registry.dispatch(&ctx, payload).unwrap()
    }

    #[test]
    fn test_registry_has_every_verb() {
        let registry = CommandRegistry::with_filesystem(Arc::new(MemoryFilesystem::new()));
        assert_eq!(registry.list_verbs(), Verb::ALL.to_vec());
        for verb in Verb::ALL {
            assert_eq!(registry.get(verb).unwrap().verb(), verb);
        }
    }

    #[test]
    fn test_registry_rejects_bad_modes() {
        let config = FilesystemConfig {
            folder_mode: "abc".to_string(),
            ..FilesystemConfig::default()
        };
        assert!(CommandRegistry::new(Arc::new(MemoryFilesystem::new()), &config).is_err());
    }

    #[test]
    fn test_dispatch_scenario() {
        let fs = Arc::new(MemoryFilesystem::new());
        fs.create_dir_all("/tmp").unwrap();
        let registry = CommandRegistry::with_filesystem(fs.clone());

        assert_eq!(dispatch(&registry, Verb::Create, b"/tmp/a.txt\nhello").unwrap(), 5);
        assert_eq!(dispatch(&registry, Verb::Update, b"/tmp/a.txt|world|0").unwrap(), 5);
        assert_eq!(fs.read("/tmp/a.txt").unwrap(), b"helloworld");
        assert_eq!(dispatch(&registry, Verb::Update, b"/tmp/a.txt|bye|1").unwrap(), 3);
        assert_eq!(fs.read("/tmp/a.txt").unwrap(), b"bye");

        dispatch(&registry, Verb::RenameFile, b"/tmp/a.txt\nb.txt").unwrap();
        assert!(fs.exists("/tmp/b.txt"));
        assert!(!fs.exists("/tmp/a.txt"));

        assert_eq!(dispatch(&registry, Verb::DeleteFile, b"/tmp/b.txt").unwrap(), 0);
        assert!(matches!(
            dispatch(&registry, Verb::DeleteFile, b"/tmp/b.txt"),
            Err(OpError::NotFound { .. })
        ));

        assert_eq!(fs.open_handles(), 0);
    }

    #[test]
    fn test_dispatch_malformed_is_operation_error() {
        let registry = CommandRegistry::with_filesystem(Arc::new(MemoryFilesystem::new()));
        assert!(matches!(
            dispatch(&registry, Verb::Update, b"/tmp/a.txt|x|maybe"),
            Err(OpError::MalformedInput { .. })
        ));
    }
}
