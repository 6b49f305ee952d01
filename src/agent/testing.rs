//! Test doubles shared by the agent and orchestration unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::llm::{ModelClient, ToolCallRequest, ToolCallResponse};
use crate::memory::{Message, ToolArguments, ToolCall};
use crate::registry::{LocalTool, ToolRegistry};
use crate::sequencer::{EventMessage, EventSequencer, SequencedPrinter, TracingPrinter};

use super::AgentContext;

/// Model that replays queued responses and records every request.
///
/// Once the queue is empty it answers with plain text `"Done"`.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ToolCallResponse>>>,
    answers: Mutex<VecDeque<Result<String>>>,
    pub(crate) requests: Mutex<Vec<ToolCallRequest>>,
}

impl ScriptedModel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_responses(responses: Vec<Result<ToolCallResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    pub(crate) fn push_answer(&self, answer: Result<String>) {
        self.answers.lock().unwrap().push_back(answer);
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn ask_tool(&self, request: ToolCallRequest) -> Result<ToolCallResponse> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ToolCallResponse::text("Done")))
    }

    async fn ask(
        &self,
        _request_id: &str,
        _messages: Vec<Message>,
        _system: Option<Message>,
        _temperature: Option<f32>,
    ) -> Result<String> {
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("Summary".to_string()))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Tool that echoes its `text` argument.
pub(crate) struct EchoTool;

#[async_trait]
impl LocalTool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}}})
    }

    async fn execute(&self, args: ToolArguments) -> Result<String> {
        let text = args
            .as_value()
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(format!("echo: {}", text))
    }
}

pub(crate) fn echo_call(id: &str, text: &str) -> ToolCall {
    ToolCall::new(id, "echo", json!({ "text": text }).to_string())
}

pub(crate) fn registry_with_echo() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry
        .register_local(Arc::new(EchoTool))
        .expect("echo is a valid tool name");
    registry
}

/// Context whose events are only traced.
pub(crate) fn context() -> AgentContext {
    AgentContext::new(
        "req-test",
        "test query",
        Arc::new(TracingPrinter::new("req-test")),
        registry_with_echo(),
    )
}

/// Context whose events are sequenced and collected.
pub(crate) fn recording_context(
    query: &str,
) -> (AgentContext, Arc<SequencedPrinter>, tokio::sync::mpsc::UnboundedReceiver<EventMessage>) {
    let (printer, rx) = SequencedPrinter::new("req-test", EventSequencer::new());
    let printer = Arc::new(printer);
    let ctx = AgentContext::new("req-test", query, printer.clone(), registry_with_echo());
    (ctx, printer, rx)
}

/// Drain every event sent so far.
pub(crate) fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<EventMessage>) -> Vec<EventMessage> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
