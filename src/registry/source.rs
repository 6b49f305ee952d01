//! Tool source tracking for the registry.

use serde::{Deserialize, Serialize};

/// Where a resolved tool executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolSource {
    /// In-process tool.
    Local,

    /// Tool behind a remote tool server, invoked through a proxy.
    Remote,
}

impl ToolSource {
    /// Get the string representation of the source.
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolSource::Local => "local",
            ToolSource::Remote => "remote",
        }
    }

    /// Check if this is a local tool source.
    pub fn is_local(&self) -> bool {
        matches!(self, ToolSource::Local)
    }

    /// Check if this is a remote tool source.
    pub fn is_remote(&self) -> bool {
        matches!(self, ToolSource::Remote)
    }
}

impl std::fmt::Display for ToolSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_source_display() {
        assert_eq!(ToolSource::Local.to_string(), "local");
        assert_eq!(ToolSource::Remote.to_string(), "remote");
    }

    #[test]
    fn test_tool_source_checks() {
        assert!(ToolSource::Local.is_local());
        assert!(!ToolSource::Local.is_remote());
        assert!(ToolSource::Remote.is_remote());
    }

    #[test]
    fn test_tool_source_serialization() {
        let json = serde_json::to_string(&ToolSource::Local).unwrap();
        assert_eq!(json, "\"local\"");

        let parsed: ToolSource = serde_json::from_str("\"remote\"").unwrap();
        assert_eq!(parsed, ToolSource::Remote);
    }
}
