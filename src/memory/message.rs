//! Role-tagged conversation messages and model-proposed tool calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agent::AgentError;

/// Marker placed between a struct-parse assistant turn and the tool output folded into it.
pub const STRUCT_PARSE_RESULT_MARKER: &str = "\n Tool execution result:\n";

/// Conversation role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End-user or synthetic next-step prompt.
    User,
    /// System instructions.
    System,
    /// Model output.
    Assistant,
    /// Tool observation.
    Tool,
}

impl Role {
    /// Get the string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::System => "system",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "system" => Ok(Role::System),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            _ => Err(AgentError::UnsupportedRole(s.to_string())),
        }
    }
}

/// Opaque structured arguments of a tool invocation.
///
/// The core never inspects the payload; each tool deserializes the
/// shape it expects with [`ToolArguments::parse`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments(Value);

impl ToolArguments {
    /// Wrap an already-parsed JSON value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse the raw argument text produced by the model.
    ///
    /// Empty text is treated as an empty object.
    pub fn from_json_str(raw: &str) -> serde_json::Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self(Value::Object(Default::default())));
        }
        serde_json::from_str(raw).map(Self)
    }

    /// Deserialize into the tool's own parameter type.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        T::deserialize(&self.0)
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume and return the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// A model-proposed request to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifies this invocation within its step.
    pub id: String,
    /// Tool name to resolve in the registry.
    pub name: String,
    /// Raw argument text as produced by the model.
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the raw argument text.
    pub fn parsed_arguments(&self) -> serde_json::Result<ToolArguments> {
        ToolArguments::from_json_str(&self.arguments)
    }
}

/// A single conversational turn.
///
/// Messages are immutable once created; helpers that "amend" a message
/// return a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Role of the author.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Optional base64-encoded image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64_image: Option<String>,
    /// Call id this message answers (tool messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool calls proposed by the assistant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>, base64_image: Option<String>) -> Self {
        Self {
            role,
            content: content.into(),
            base64_image,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>, base64_image: Option<String>) -> Self {
        Self::plain(Role::User, content, base64_image)
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>, base64_image: Option<String>) -> Self {
        Self::plain(Role::System, content, base64_image)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>, base64_image: Option<String>) -> Self {
        Self::plain(Role::Assistant, content, base64_image)
    }

    /// Create a tool observation answering `tool_call_id`.
    pub fn tool(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        base64_image: Option<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::plain(Role::Tool, content, base64_image)
        }
    }

    /// Create an assistant message carrying tool calls.
    pub fn from_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(tool_calls),
            ..Self::plain(Role::Assistant, content, None)
        }
    }

    /// Copy of this message with a tool result folded into its content.
    pub fn with_folded_result(&self, result: &str) -> Self {
        let mut amended = self.clone();
        amended.content = format!("{}{}{}", self.content, STRUCT_PARSE_RESULT_MARKER, result);
        amended
    }

    /// Whether the assistant proposed at least one tool call.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_role_parsing() {
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert_eq!("tool".parse::<Role>().unwrap(), Role::Tool);

        let err = "moderator".parse::<Role>().unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedRole(ref r) if r == "moderator"));
    }

    #[test]
    fn test_message_constructors() {
        let msg = Message::tool("42", "call_1", None);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));

        let msg = Message::from_tool_calls("", vec![ToolCall::new("c", "search", "{}")]);
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.has_tool_calls());
        assert!(!Message::assistant("hi", None).has_tool_calls());
    }

    #[test]
    fn test_folded_result_leaves_original_untouched() {
        let original = Message::assistant("calling search", None);
        let amended = original.with_folded_result("3 hits");

        assert_eq!(original.content, "calling search");
        assert!(amended.content.starts_with("calling search"));
        assert!(amended.content.ends_with("3 hits"));
    }

    #[test]
    fn test_tool_arguments_parse() {
        #[derive(Deserialize)]
        struct SearchArgs {
            query: String,
        }

        let call = ToolCall::new("c1", "search", r#"{"query": "rust"}"#);
        let args: SearchArgs = call.parsed_arguments().unwrap().parse().unwrap();
        assert_eq!(args.query, "rust");

        let empty = ToolArguments::from_json_str("  ").unwrap();
        assert!(empty.as_value().is_object());

        assert!(ToolArguments::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_message_serialization() {
        let json = serde_json::to_value(Message::tool("ok", "call_9", None)).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["toolCallId"], "call_9");
        assert!(json.get("toolCalls").is_none());
    }
}
