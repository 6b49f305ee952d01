//! Agent state machine and run loop.
//!
//! An agent is an [`AgentCore`] (memory, tools, model client, step budget
//! and state) plus a `step` implementation. The shared [`run_loop`] drives
//! `step` until the agent finishes, the budget runs out or a step fails.
//!
//! # Agents
//!
//! - [`ReactAgent`]: single-task think/act loop, also used as the
//!   Plan-Execute executor.
//! - [`PlanningAgent`]: maintains the task plan through the `planning` tool.
//! - [`SummaryAgent`]: one-shot summarization of a finished run.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::llm::{FunctionCallType, ModelClient, ToolCallRequest, ToolCallResponse, ToolChoice};
use crate::memory::{Memory, Message, Role, ToolCall};
use crate::registry::ToolRegistry;

mod context;
mod error;
mod planning;
mod react;
mod summary;
#[cfg(test)]
pub(crate) mod testing;

pub use context::{format_file_info, AgentContext, FileInfo};
pub use error::{AgentError, AgentResult};
pub use planning::{PlanningAgent, PLAN_FINISHED};
pub use react::ReactAgent;
pub use summary::{SummaryAgent, TaskSummaryResult};

/// Returned by [`run_loop`] when the budget allowed no step at all.
pub const NO_STEPS_EXECUTED: &str = "No steps executed";

/// Returned by a think/act step whose think phase declined to act.
pub const NO_ACTION_NEEDED: &str = "Thinking complete - no action needed";

/// Text recorded when an agent stops because its step budget ran out.
pub fn truncation_record(max_steps: usize) -> String {
    format!("Terminated: Reached max steps ({})", max_steps)
}

/// Execution state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AgentState {
    /// Not running. Also the state after the step budget ran out.
    #[default]
    Idle,
    /// Inside the step loop.
    Running,
    /// Completed successfully.
    Finished,
    /// A step failed.
    Error,
}

impl AgentState {
    /// Get the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "IDLE",
            AgentState::Running => "RUNNING",
            AgentState::Finished => "FINISHED",
            AgentState::Error => "ERROR",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State shared by every agent implementation.
pub struct AgentCore {
    pub name: String,
    pub system_prompt: String,
    pub next_step_prompt: String,
    pub memory: Memory,
    pub tools: ToolRegistry,
    pub llm: Arc<dyn ModelClient>,
    pub context: Arc<AgentContext>,
    pub state: AgentState,
    pub max_steps: usize,
    pub current_step: usize,
    /// Maximum characters kept from each tool result.
    pub max_observe: Option<usize>,
    pub function_call_type: FunctionCallType,
    pub temperature: Option<f32>,
    pub timeout_seconds: u64,
}

impl fmt::Debug for AgentCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCore")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("current_step", &self.current_step)
            .field("max_steps", &self.max_steps)
            .field("memory_len", &self.memory.len())
            .field("model", &self.llm.model_name())
            .finish()
    }
}

impl AgentCore {
    /// Create an idle core with an empty memory.
    ///
    /// # Arguments
    /// * `name` - Agent name used in logs.
    /// * `context` - Run context shared with the other agents of the run.
    /// * `llm` - Model client.
    /// * `tools` - Tools this agent may call.
    pub fn new(
        name: impl Into<String>,
        context: Arc<AgentContext>,
        llm: Arc<dyn ModelClient>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            system_prompt: String::new(),
            next_step_prompt: String::new(),
            memory: Memory::new(),
            tools,
            llm,
            context,
            state: AgentState::Idle,
            max_steps: 10,
            current_step: 0,
            max_observe: None,
            function_call_type: FunctionCallType::default(),
            temperature: None,
            timeout_seconds: 300,
        }
    }

    pub fn with_prompts(
        mut self,
        system_prompt: impl Into<String>,
        next_step_prompt: impl Into<String>,
    ) -> Self {
        self.system_prompt = system_prompt.into();
        self.next_step_prompt = next_step_prompt.into();
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_observe(mut self, max_observe: Option<usize>) -> Self {
        self.max_observe = max_observe;
        self
    }

    pub fn with_function_call_type(mut self, function_call_type: FunctionCallType) -> Self {
        self.function_call_type = function_call_type;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Copy of this core for a concurrently running sub-task.
    ///
    /// The copy owns a snapshot of the memory and starts with a fresh
    /// step counter. Tools, model client and context are shared.
    pub fn fork(&self) -> Self {
        Self {
            name: self.name.clone(),
            system_prompt: self.system_prompt.clone(),
            next_step_prompt: self.next_step_prompt.clone(),
            memory: Memory::from_messages(self.memory.snapshot()),
            tools: self.tools.clone(),
            llm: Arc::clone(&self.llm),
            context: Arc::clone(&self.context),
            state: self.state,
            max_steps: self.max_steps,
            current_step: 0,
            max_observe: self.max_observe,
            function_call_type: self.function_call_type,
            temperature: self.temperature,
            timeout_seconds: self.timeout_seconds,
        }
    }

    /// Append a message built from its role.
    ///
    /// # Arguments
    /// * `role` - Role of the new message.
    /// * `content` - Message text.
    /// * `base64_image` - Optional attached image.
    /// * `tool_call_id` - Required for [`Role::Tool`], ignored otherwise.
    pub fn update_memory(
        &mut self,
        role: Role,
        content: impl Into<String>,
        base64_image: Option<String>,
        tool_call_id: Option<&str>,
    ) -> AgentResult<()> {
        let message = match role {
            Role::User => Message::user(content, base64_image),
            Role::System => Message::system(content, base64_image),
            Role::Assistant => Message::assistant(content, base64_image),
            Role::Tool => {
                let id = tool_call_id.ok_or(AgentError::MissingToolCallId)?;
                Message::tool(content, id, base64_image)
            }
        };
        self.memory.append(message);
        Ok(())
    }

    /// Append `prompt` as a user turn unless the user spoke last.
    pub(crate) fn ensure_user_turn(&mut self, prompt: &str) -> AgentResult<()> {
        if self.memory.is_empty() || self.memory.last()?.role != Role::User {
            self.memory.append(Message::user(prompt, None));
        }
        Ok(())
    }

    /// Build a tool-augmented request over the current memory.
    pub(crate) fn tool_call_request(
        &self,
        system_prompt: String,
        tool_choice: ToolChoice,
        stream_message_type: &str,
    ) -> ToolCallRequest {
        ToolCallRequest {
            request_id: self.context.request_id.clone(),
            messages: self.memory.snapshot(),
            system: Some(Message::system(system_prompt, None)),
            tools: self.tools.schemas(),
            tool_choice,
            temperature: self.temperature,
            stream: self.context.is_stream,
            stream_message_type: stream_message_type.to_string(),
            timeout_seconds: self.timeout_seconds,
        }
    }

    /// Record the model's reply in memory.
    ///
    /// Under struct-parse the reply stays a plain assistant turn even when
    /// it carried tool calls.
    pub(crate) fn record_response(&mut self, response: &ToolCallResponse) {
        let message = match self.function_call_type {
            FunctionCallType::FunctionCall if !response.tool_calls.is_empty() => {
                Message::from_tool_calls(response.content.clone(), response.tool_calls.clone())
            }
            _ => Message::assistant(response.content.clone(), None),
        };
        self.memory.append(message);
    }

    /// Record a model-call failure and finish the agent.
    pub(crate) fn record_model_failure(&mut self, err: &anyhow::Error) {
        error!(
            request_id = %self.context.request_id,
            agent = %self.name,
            "Model call failed: {:#}",
            err
        );
        let message = format!("Error encountered while processing: {}", err);
        self.context.log(|l| l.log_error(&message, None));
        self.memory.append(Message::assistant(message, None));
        self.state = AgentState::Finished;
    }

    /// Cut a tool result down to the observation limit.
    pub(crate) fn limit_observation(&self, result: String) -> String {
        match self.max_observe {
            Some(limit) if result.chars().count() > limit => result.chars().take(limit).collect(),
            _ => result,
        }
    }

    /// Record one tool result in memory.
    ///
    /// Under struct-parse the result is folded into the most recent
    /// message; otherwise it becomes a tool message answering `call`.
    pub(crate) fn record_observation(&mut self, call: &ToolCall, result: &str) -> AgentResult<()> {
        match self.function_call_type {
            FunctionCallType::StructParse => {
                self.memory.amend_last(|last| last.with_folded_result(result))
            }
            FunctionCallType::FunctionCall => {
                self.update_memory(Role::Tool, result, None, Some(&call.id))
            }
        }
    }

    /// Content of the most recent message, or empty.
    pub(crate) fn last_content(&self) -> String {
        self.memory
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Emit a final event through the run's printer.
    pub(crate) fn emit(&self, message_type: &str, payload: Value) {
        self.context.printer.send_final(message_type, payload);
    }
}

/// An agent driven by the shared run loop.
#[async_trait]
pub trait Agent: Send {
    fn core(&self) -> &AgentCore;

    fn core_mut(&mut self) -> &mut AgentCore;

    /// Perform one step and return its output.
    async fn step(&mut self) -> AgentResult<String>;

    /// Run the agent on `query` until it finishes or its budget runs out.
    async fn run(&mut self, query: &str) -> AgentResult<String> {
        run_loop(self, query).await
    }

    fn state(&self) -> AgentState {
        self.core().state
    }
}

/// Agents whose step is a think phase followed by an act phase.
#[async_trait]
pub trait ReActAgent: Agent {
    /// Ask the model what to do next. Returns whether to act.
    async fn think(&mut self) -> AgentResult<bool>;

    /// Carry out what think decided.
    async fn act(&mut self) -> AgentResult<String>;
}

/// One think/act step.
pub async fn react_step<A: ReActAgent + ?Sized>(agent: &mut A) -> AgentResult<String> {
    if !agent.think().await? {
        return Ok(NO_ACTION_NEEDED.to_string());
    }
    agent.act().await
}

/// Drive `agent` until it finishes, exhausts its budget or fails.
///
/// The step counter is not reset between runs, so repeated runs of one
/// agent share its budget. Exhausting the budget resets the counter and
/// leaves the agent [`AgentState::Idle`]; a run that finds the budget
/// already spent by earlier runs is truncated the same way. A failed step
/// leaves it [`AgentState::Error`] and the error is returned.
pub async fn run_loop<A: Agent + ?Sized>(agent: &mut A, query: &str) -> AgentResult<String> {
    {
        let core = agent.core_mut();
        core.state = AgentState::Running;
        if !query.is_empty() {
            core.update_memory(Role::User, query, None, None)?;
        }
    }

    let mut last_output = None;
    loop {
        let core = agent.core_mut();
        if core.current_step >= core.max_steps || core.state == AgentState::Finished {
            break;
        }
        core.current_step += 1;
        let (step, max_steps) = (core.current_step, core.max_steps);
        info!(
            request_id = %core.context.request_id,
            agent = %core.name,
            "Executing step {}/{}",
            step,
            max_steps
        );
        let name = core.name.clone();
        core.context.log(|l| l.log_step(&name, step, max_steps));

        match agent.step().await {
            Ok(output) => {
                debug!(agent = %agent.core().name, step, "Step completed");
                last_output = Some(output);
            }
            Err(e) => {
                let core = agent.core_mut();
                core.state = AgentState::Error;
                error!(
                    request_id = %core.context.request_id,
                    agent = %core.name,
                    "Step {} failed: {}",
                    step,
                    e
                );
                return Err(e);
            }
        }
    }

    let core = agent.core_mut();
    match last_output {
        Some(output) if core.state == AgentState::Finished => Ok(output),
        _ if core.max_steps == 0 => {
            core.state = AgentState::Idle;
            Ok(NO_STEPS_EXECUTED.to_string())
        }
        _ => {
            warn!(
                request_id = %core.context.request_id,
                agent = %core.name,
                "Reached max steps ({})",
                core.max_steps
            );
            core.current_step = 0;
            core.state = AgentState::Idle;
            Ok(truncation_record(core.max_steps))
        }
    }
}
