//! Language-model client seam.
//!
//! The crate never talks to a model provider itself. Agents call a
//! [`ModelClient`] supplied by the host; prompt formatting, transport,
//! streaming and retries all live behind it.

use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::memory::{Message, ToolCall};

pub use crate::registry::ToolSchema;

/// Whether and how the model may call tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// The model must not call tools.
    None,
    /// The model decides.
    #[default]
    Auto,
    /// The model must call at least one tool.
    Required,
}

/// How tool calls and their results are represented in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCallType {
    /// Native function calling: assistant turns carry tool calls and each
    /// result becomes its own tool message.
    #[default]
    FunctionCall,
    /// Tool calls are parsed out of plain text: assistant turns stay plain
    /// and results are folded into the preceding assistant message.
    StructParse,
}

impl FunctionCallType {
    /// Get the string representation of the convention.
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionCallType::FunctionCall => "function_call",
            FunctionCallType::StructParse => "struct_parse",
        }
    }
}

impl fmt::Display for FunctionCallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FunctionCallType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "function_call" => Ok(FunctionCallType::FunctionCall),
            "struct_parse" => Ok(FunctionCallType::StructParse),
            other => Err(anyhow::anyhow!("unknown function call type '{}'", other)),
        }
    }
}

/// A tool-augmented completion request.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    /// Request this call belongs to, for correlation in logs.
    pub request_id: String,
    /// Conversation history.
    pub messages: Vec<Message>,
    /// System prompt.
    pub system: Option<Message>,
    /// Tools offered to the model.
    pub tools: Vec<ToolSchema>,
    /// Tool-calling policy.
    pub tool_choice: ToolChoice,
    /// Sampling temperature; `None` uses the client default.
    pub temperature: Option<f32>,
    /// Whether the client should stream partial output to the printer.
    pub stream: bool,
    /// Event type used for streamed partial output.
    pub stream_message_type: String,
    /// Upper bound on the call, enforced by the client transport.
    pub timeout_seconds: u64,
}

/// Model reply to a [`ToolCallRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolCallResponse {
    /// Free text produced alongside (or instead of) tool calls.
    pub content: String,
    /// Tool calls proposed by the model, in model order.
    pub tool_calls: Vec<ToolCall>,
}

impl ToolCallResponse {
    /// Plain text answer without tool calls.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Answer carrying tool calls.
    pub fn with_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
        }
    }
}

/// Host-supplied language-model client.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Ask for a completion that may propose tool calls.
    async fn ask_tool(&self, request: ToolCallRequest) -> Result<ToolCallResponse>;

    /// Ask for a plain completion.
    async fn ask(
        &self,
        request_id: &str,
        messages: Vec<Message>,
        system: Option<Message>,
        temperature: Option<f32>,
    ) -> Result<String>;

    /// Model name, for logging.
    fn model_name(&self) -> &str {
        "unknown"
    }
}
