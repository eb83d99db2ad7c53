//! Error types for the port-arranger-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for port-arranger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while allocating ports, rewriting commands and
/// managing tracked processes.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to execute a system command.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// The registry file could not be read, parsed or written.
    #[error("Registry error: {0}")]
    Registry(String),

    /// No Compose manifest exists in the working directory.
    #[error("Docker Compose file not found in {}", .0.display())]
    ManifestNotFound(PathBuf),

    /// The Compose manifest is not a usable document.
    #[error("Invalid Docker Compose file: {0}")]
    InvalidManifest(String),

    /// A service named on the command line is not declared in the manifest.
    #[error("Service not found in Docker Compose file: {0}")]
    ServiceNotFound(String),

    /// A port declaration uses a syntax this tool does not understand.
    #[error("Unsupported port format: {0}")]
    UnsupportedPortFormat(String),

    /// No free port was found within the bounded search.
    #[error("No available port found starting from {preferred} after {attempts} attempts")]
    PortExhausted { preferred: u16, attempts: u32 },

    /// The command string could not be turned into a program invocation.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The process could not be started.
    #[error("Failed to start process: {0}")]
    SpawnFailed(String),

    /// Failed to kill a process.
    #[error("Failed to kill process {pid}: {reason}")]
    KillFailed { pid: u32, reason: String },

    /// Permission denied for an operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// No registry entry exists under the given name.
    #[error("Process '{0}' not found")]
    ProcessNotFound(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Platform not supported.
    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),
}
