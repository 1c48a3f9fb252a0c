//! Configuration settings for the file manager daemon.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::commands::Verb;
use crate::error::DaemonError;

/// Main configuration structure for the daemon.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub filesystem: FilesystemConfig,
}

/// Command channel configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Directory holding one socket per verb.
    #[serde(default = "default_channel_directory")]
    pub directory: PathBuf,
    /// Socket file permissions (e.g., "0660").
    #[serde(default = "default_socket_permissions")]
    pub permissions: String,
    /// Verbs to expose. Each gets `<directory>/<verb>.sock`.
    #[serde(default = "default_verbs")]
    pub verbs: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format ("pretty" or "json").
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Limits configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum command payload size in bytes.
    #[serde(default = "default_max_payload_size")]
    pub max_payload_size: usize,
    /// Maximum concurrent connections per endpoint.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    /// Socket read/write timeout in seconds.
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_seconds: u64,
    /// How long shutdown waits for in-flight connections.
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_seconds: u64,
}

/// Filesystem backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FilesystemConfig {
    /// Backend name ("os" or "memory").
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Permission bits for files created by `create`.
    #[serde(default = "default_file_mode")]
    pub file_mode: String,
    /// Permission bits for directories created by `create-folder`.
    #[serde(default = "default_folder_mode")]
    pub folder_mode: String,
}

// Default value functions
fn default_channel_directory() -> PathBuf {
    PathBuf::from("/run/fm-daemon")
}

fn default_socket_permissions() -> String {
    "0660".to_string()
}

fn default_verbs() -> Vec<String> {
    Verb::ALL.iter().map(|verb| verb.name().to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_max_payload_size() -> usize {
    4096 // one page
}

fn default_max_concurrent() -> usize {
    64
}

fn default_socket_timeout() -> u64 {
    30
}

fn default_drain_timeout() -> u64 {
    30
}

fn default_backend() -> String {
    "os".to_string()
}

fn default_file_mode() -> String {
    "0644".to_string()
}

fn default_folder_mode() -> String {
    "0755".to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            directory: default_channel_directory(),
            permissions: default_socket_permissions(),
            verbs: default_verbs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_payload_size: default_max_payload_size(),
            max_concurrent_requests: default_max_concurrent(),
            socket_timeout_seconds: default_socket_timeout(),
            drain_timeout_seconds: default_drain_timeout(),
        }
    }
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            file_mode: default_file_mode(),
            folder_mode: default_folder_mode(),
        }
    }
}

/// Parse an octal permission string such as "0660".
pub fn parse_mode(value: &str) -> Result<u32, DaemonError> {
    if value.is_empty() || !value.chars().all(|c| c.is_digit(8)) {
        return Err(DaemonError::Config {
            message: format!("Invalid mode '{}'. Must be octal (e.g., '0660')", value),
        });
    }

    let mode = u32::from_str_radix(value, 8).map_err(|e| DaemonError::Config {
        message: format!("Invalid mode '{}': {}", value, e),
    })?;
    if mode > 0o7777 {
        return Err(DaemonError::Config {
            message: format!("Mode '{}' is out of range", value),
        });
    }
    Ok(mode)
}

impl ChannelConfig {
    /// Socket file permission bits.
    pub fn socket_mode(&self) -> Result<u32, DaemonError> {
        parse_mode(&self.permissions)
    }

    /// Enabled verbs in configuration order, without duplicates.
    pub fn enabled_verbs(&self) -> Result<Vec<Verb>, DaemonError> {
        let mut verbs = Vec::with_capacity(self.verbs.len());
        for name in &self.verbs {
            let verb = Verb::from_name(name).ok_or_else(|| DaemonError::Config {
                message: format!(
                    "Unknown verb '{}'. Valid verbs: {:?}",
                    name,
                    Verb::ALL.iter().map(|v| v.name()).collect::<Vec<_>>()
                ),
            })?;
            if !verbs.contains(&verb) {
                verbs.push(verb);
            }
        }
        Ok(verbs)
    }
}

impl FilesystemConfig {
    pub fn file_mode(&self) -> Result<u32, DaemonError> {
        parse_mode(&self.file_mode)
    }

    pub fn folder_mode(&self) -> Result<u32, DaemonError> {
        parse_mode(&self.folder_mode)
    }
}

impl Settings {
    /// Load settings from a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DaemonError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DaemonError::Config {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::from_toml_str(&content).map_err(|e| DaemonError::Config {
            message: format!("Invalid config file '{}': {}", path.display(), e),
        })
    }

    /// Parse and validate settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, DaemonError> {
        let settings: Settings = toml::from_str(content).map_err(|e| DaemonError::Config {
            message: format!("Failed to parse config: {}", e),
        })?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), DaemonError> {
        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log level '{}'. Valid levels: {:?}",
                    self.logging.level, valid_levels
                ),
            });
        }

        // Validate log format
        let valid_formats = ["pretty", "json"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid log format '{}'. Valid formats: {:?}",
                    self.logging.format, valid_formats
                ),
            });
        }

        self.channel.socket_mode()?;
        if self.channel.enabled_verbs()?.is_empty() {
            return Err(DaemonError::Config {
                message: "At least one verb must be enabled".to_string(),
            });
        }

        if self.limits.max_payload_size == 0 {
            return Err(DaemonError::Config {
                message: "limits.max_payload_size must be greater than zero".to_string(),
            });
        }
        if self.limits.max_concurrent_requests == 0 {
            return Err(DaemonError::Config {
                message: "limits.max_concurrent_requests must be greater than zero".to_string(),
            });
        }

        // Validate filesystem backend
        let valid_backends = ["os", "memory"];
        if !valid_backends.contains(&self.filesystem.backend.to_lowercase().as_str()) {
            return Err(DaemonError::Config {
                message: format!(
                    "Invalid filesystem backend '{}'. Valid backends: {:?}",
                    self.filesystem.backend, valid_backends
                ),
            });
        }

        self.filesystem.file_mode()?;
        self.filesystem.folder_mode()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        assert_eq!(default_socket_permissions(), "0660");
        assert_eq!(default_log_level(), "info");
        assert_eq!(default_log_format(), "pretty");
        assert_eq!(default_verbs().len(), Verb::ALL.len());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings.channel.directory, PathBuf::from("/run/fm-daemon"));
        assert_eq!(settings.limits.max_payload_size, 4096);
        assert_eq!(settings.filesystem.backend, "os");
        assert_eq!(settings.filesystem.folder_mode().unwrap(), 0o755);
    }

    #[test]
    fn test_partial_config() {
        let settings = Settings::from_toml_str(
            r#"
            [channel]
            directory = "/tmp/fm"
            verbs = ["create", "delete-file", "create"]

            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(settings.channel.permissions, "0660");
        assert_eq!(
            settings.channel.enabled_verbs().unwrap(),
            vec![Verb::Create, Verb::DeleteFile]
        );
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(Settings::from_toml_str("[logging]\nlevel = \"loud\"").is_err());
        assert!(Settings::from_toml_str("[channel]\nverbs = [\"chmod\"]").is_err());
        assert!(Settings::from_toml_str("[channel]\nverbs = []").is_err());
        assert!(Settings::from_toml_str("[channel]\npermissions = \"0999\"").is_err());
        assert!(Settings::from_toml_str("[limits]\nmax_payload_size = 0").is_err());
        assert!(Settings::from_toml_str("[filesystem]\nbackend = \"tape\"").is_err());
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("0660").unwrap(), 0o660);
        assert_eq!(parse_mode("755").unwrap(), 0o755);
        assert!(parse_mode("").is_err());
        assert!(parse_mode("rwx").is_err());
        assert!(parse_mode("17777").is_err());
    }
}
