//! Local tool trait and the schema offered to the model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::memory::ToolArguments;

use super::ToolSource;

/// An in-process capability the model can invoke by name.
///
/// Implementations deserialize their own argument shape via
/// [`ToolArguments::parse`] and report failures through `anyhow`;
/// the registry turns those into observation strings.
#[async_trait]
pub trait LocalTool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Human-readable description shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value;

    /// Run the tool.
    async fn execute(&self, args: ToolArguments) -> anyhow::Result<String>;
}

/// Function-style description of a tool, as offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON schema of the arguments.
    pub parameters: Value,
    /// Where the tool executes.
    pub source: ToolSource,
}

impl ToolSchema {
    /// Describe a local tool.
    pub fn from_local(tool: &dyn LocalTool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            parameters: tool.parameters(),
            source: ToolSource::Local,
        }
    }

    /// One `name: description` line, used to fill the `{{tools}}` prompt placeholder.
    pub fn prompt_line(&self) -> String {
        format!("tool: {} description: {}", self.name, self.description)
    }
}
