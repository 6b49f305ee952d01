//! Environment variable loading and management.
//!
//! This module handles ONLY host-level overrides. Model credentials and
//! endpoints belong to the host's [`ModelClient`](crate::llm::ModelClient).

use std::env;
use std::path::Path;

use super::Configuration;

/// Environment variable naming the remote tool proxy base URL.
pub const REMOTE_CLIENT_URL_VAR: &str = "ARK_REMOTE_CLIENT_URL";
/// Environment variable selecting the numeric agent type.
pub const AGENT_TYPE_VAR: &str = "ARK_AGENT_TYPE";

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to .env file. Nothing is loaded when None.
    pub fn new(env_file: Option<&Path>) -> Self {
        // Only load a .env file if an explicit path was provided, so unit
        // tests never pick up a stray repository .env.
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    tracing::warn!(path = %path.display(), "Failed to load .env file: {}", e);
                }
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// Path of the .env file this loader was created with.
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    /// Remote tool proxy base URL override.
    pub fn remote_client_url(&self) -> Option<String> {
        env::var(REMOTE_CLIENT_URL_VAR).ok().filter(|v| !v.is_empty())
    }

    /// Agent type override. Unparseable values are ignored.
    pub fn agent_type(&self) -> Option<u8> {
        env::var(AGENT_TYPE_VAR).ok()?.trim().parse().ok()
    }

    /// Fold the overrides that are set into `config`.
    ///
    /// `ARK_REMOTE_CLIENT_URL` replaces `[remote] client_url` and
    /// `ARK_AGENT_TYPE` replaces `[agent] default_agent_type`.
    pub fn apply_overrides(&self, config: &mut Configuration) {
        if let Some(url) = self.remote_client_url() {
            tracing::debug!("Remote proxy overridden by {}", REMOTE_CLIENT_URL_VAR);
            config.remote.client_url = Some(url);
        }
        if let Some(agent_type) = self.agent_type() {
            tracing::debug!("Agent type overridden by {}", AGENT_TYPE_VAR);
            config.agent.default_agent_type = agent_type;
        }
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
