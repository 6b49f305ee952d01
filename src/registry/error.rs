//! Error types for the tool registry.

use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The tool name is empty.
    #[error("Invalid tool name '{0}': must not be empty")]
    InvalidName(String),

    /// The requested tool was not found.
    #[error("Tool '{0}' not found")]
    NotFound(String),

    /// The model produced arguments the registry could not parse.
    #[error("Invalid arguments for tool '{name}': {reason}")]
    InvalidArguments {
        /// Tool name.
        name: String,
        /// Parse failure.
        reason: String,
    },

    /// A local tool returned an error.
    #[error("Tool '{name}' failed: {reason}")]
    ExecutionFailed {
        /// Tool name.
        name: String,
        /// Failure reported by the tool.
        reason: String,
    },

    /// A remote tool was resolved but no proxy is configured.
    #[error("Remote tool '{0}' cannot be called: no remote proxy configured")]
    RemoteUnavailable(String),

    /// The remote proxy call failed.
    #[error("Remote tool '{name}' on {server} failed: {reason}")]
    RemoteCallFailed {
        /// Tool name.
        name: String,
        /// Server address the tool lives behind.
        server: String,
        /// Transport or server error.
        reason: String,
    },
}

impl RegistryError {
    /// Render this error as the observation string the model sees.
    ///
    /// Tool failures never abort a step; they are folded into memory as text.
    pub fn to_observation(&self) -> String {
        match self {
            RegistryError::NotFound(name) => format!("Error: unknown tool '{}'", name),
            RegistryError::InvalidName(name) => format!("Error: unknown tool '{}'", name),
            RegistryError::InvalidArguments { name, reason } => {
                format!("Error: tool '{}' failed: invalid arguments: {}", name, reason)
            }
            RegistryError::ExecutionFailed { name, reason } => {
                format!("Error: tool '{}' failed: {}", name, reason)
            }
            RegistryError::RemoteUnavailable(name) => {
                format!("Error: tool '{}' failed: no remote proxy configured", name)
            }
            RegistryError::RemoteCallFailed { name, reason, .. } => {
                format!("Error: tool '{}' failed: {}", name, reason)
            }
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
