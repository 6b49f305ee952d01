//! Single-task think/act agent.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use crate::config::Configuration;
use crate::llm::{ModelClient, ToolChoice};
use crate::memory::{ToolArguments, ToolCall};
use crate::prompt::{self, render_template, tools_prompt};
use crate::sequencer::message_type;

use super::{
    format_file_info, react_step, run_loop, Agent, AgentContext, AgentCore, AgentResult,
    AgentState, ReActAgent,
};

/// Agent that asks the model for tool calls, runs them concurrently and
/// feeds the results back until the model answers without calling tools.
///
/// The same type serves as the standalone ReAct agent and as the
/// Plan-Execute executor; only prompts and budgets differ.
#[derive(Debug)]
pub struct ReactAgent {
    core: AgentCore,
    tool_calls: Vec<ToolCall>,
    silent_tools: HashSet<String>,
    filter_internal_files: bool,
    task: Option<String>,
}

impl ReactAgent {
    /// Wrap a prepared core.
    pub fn new(core: AgentCore) -> Self {
        Self {
            core,
            tool_calls: Vec::new(),
            silent_tools: HashSet::new(),
            filter_internal_files: false,
            task: None,
        }
    }

    /// Standalone ReAct agent for a run.
    pub fn react(
        context: Arc<AgentContext>,
        llm: Arc<dyn ModelClient>,
        config: &Configuration,
    ) -> Self {
        let settings = &config.react;
        let tools = context.tools.clone();
        let system_prompt = static_prompt(
            &context,
            settings.system_prompt.as_deref().unwrap_or(prompt::REACT_SYSTEM_PROMPT),
            &tools_prompt(&tools.schemas()),
        );
        let next_step_prompt = static_prompt(
            &context,
            settings
                .next_step_prompt
                .as_deref()
                .unwrap_or(prompt::REACT_NEXT_STEP_PROMPT),
            "",
        );

        let core = AgentCore::new("react", context, llm, tools)
            .with_prompts(system_prompt, next_step_prompt)
            .with_max_steps(settings.max_steps)
            .with_max_observe(settings.max_observe)
            .with_function_call_type(config.llm.function_call_type)
            .with_temperature(config.llm.temperature)
            .with_timeout_seconds(config.llm.timeout_seconds);

        Self::new(core)
            .with_silent_tools(config.tools.silent_tools.iter().cloned())
            .with_filter_internal_files(true)
    }

    /// Executor for Plan-Execute runs.
    pub fn executor(
        context: Arc<AgentContext>,
        llm: Arc<dyn ModelClient>,
        config: &Configuration,
    ) -> Self {
        let settings = &config.executor;
        let tools = context.tools.clone();
        let system_prompt = static_prompt(
            &context,
            settings
                .system_prompt
                .as_deref()
                .unwrap_or(prompt::EXECUTOR_SYSTEM_PROMPT),
            &tools_prompt(&tools.schemas()),
        );
        let next_step_prompt = static_prompt(
            &context,
            settings
                .next_step_prompt
                .as_deref()
                .unwrap_or(prompt::EXECUTOR_NEXT_STEP_PROMPT),
            "",
        );

        let core = AgentCore::new("executor", context, llm, tools)
            .with_prompts(system_prompt, next_step_prompt)
            .with_max_steps(settings.max_steps)
            .with_max_observe(settings.max_observe)
            .with_function_call_type(config.llm.function_call_type)
            .with_temperature(config.llm.temperature)
            .with_timeout_seconds(config.llm.timeout_seconds);

        Self::new(core).with_silent_tools(config.tools.silent_tools.iter().cloned())
    }

    /// Tools whose results are not emitted as events.
    pub fn with_silent_tools<I: IntoIterator<Item = String>>(mut self, names: I) -> Self {
        self.silent_tools.extend(names);
        self
    }

    /// Hide internal files from the `{{files}}` placeholder.
    pub fn with_filter_internal_files(mut self, filter: bool) -> Self {
        self.filter_internal_files = filter;
        self
    }

    /// Copy of this agent for one concurrently executed sub-task.
    pub fn fork(&self) -> Self {
        Self {
            core: self.core.fork(),
            tool_calls: Vec::new(),
            silent_tools: self.silent_tools.clone(),
            filter_internal_files: self.filter_internal_files,
            task: self.task.clone(),
        }
    }

    /// Tool calls proposed by the last think phase.
    pub fn pending_tool_calls(&self) -> &[ToolCall] {
        &self.tool_calls
    }

    /// Task of the most recent run.
    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    fn render(&self, template: &str) -> String {
        let files = format_file_info(&self.core.context.product_files(), self.filter_internal_files);
        let task = self.task.as_deref().unwrap_or_default();
        render_template(template, &[("files", files.as_str()), ("task", task)])
    }
}

/// Fill the placeholders that stay fixed for the whole run.
fn static_prompt(context: &AgentContext, template: &str, tools: &str) -> String {
    render_template(
        template,
        &[
            ("tools", tools),
            ("query", context.query.as_str()),
            ("date", context.date_info.as_str()),
            ("basePrompt", context.base_prompt.as_str()),
            ("sopPrompt", context.sop_prompt.as_str()),
        ],
    )
}

fn tool_param(call: &ToolCall) -> Value {
    call.parsed_arguments()
        .map(ToolArguments::into_value)
        .unwrap_or_else(|_| Value::String(call.arguments.clone()))
}

#[async_trait]
impl Agent for ReactAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    async fn step(&mut self) -> AgentResult<String> {
        react_step(self).await
    }

    async fn run(&mut self, query: &str) -> AgentResult<String> {
        if !query.is_empty() {
            self.task = Some(query.to_string());
            self.core.context.set_current_task(query);
        }
        run_loop(self, query).await
    }
}

#[async_trait]
impl ReActAgent for ReactAgent {
    async fn think(&mut self) -> AgentResult<bool> {
        let system_prompt = self.render(&self.core.system_prompt);
        let next_step_prompt = self.render(&self.core.next_step_prompt);
        self.core.ensure_user_turn(&next_step_prompt)?;

        let request = self.core.tool_call_request(
            system_prompt,
            ToolChoice::Auto,
            message_type::TOOL_THOUGHT,
        );
        let llm = Arc::clone(&self.core.llm);
        let context = Arc::clone(&self.core.context);

        match llm.ask_tool(request).await {
            Ok(response) => {
                info!(
                    request_id = %context.request_id,
                    agent = %self.core.name,
                    tool_calls = response.tool_calls.len(),
                    "{} thought: {}",
                    self.core.name,
                    response.content
                );
                if !context.is_stream && !response.content.is_empty() {
                    self.core
                        .emit(message_type::TOOL_THOUGHT, json!(response.content));
                }
                let names: Vec<String> =
                    response.tool_calls.iter().map(|c| c.name.clone()).collect();
                context.log(|l| {
                    l.log_llm_response(&response.content, &names, Some(llm.model_name()))
                });

                self.core.record_response(&response);
                self.tool_calls = response.tool_calls;
                Ok(true)
            }
            Err(e) => {
                self.tool_calls.clear();
                self.core.record_model_failure(&e);
                Ok(false)
            }
        }
    }

    async fn act(&mut self) -> AgentResult<String> {
        if self.tool_calls.is_empty() {
            self.core.state = AgentState::Finished;
            return Ok(self.core.last_content());
        }

        let calls = std::mem::take(&mut self.tool_calls);
        let tools = self.core.tools.clone();
        let results = tools.execute_many(&calls).await;

        let mut observations = Vec::with_capacity(calls.len());
        for call in &calls {
            let result = results.get(&call.id).cloned().unwrap_or_default();
            if !self.silent_tools.contains(&call.name) {
                self.core.emit(
                    message_type::TOOL_RESULT,
                    json!({
                        "toolName": call.name,
                        "toolParam": tool_param(call),
                        "toolResult": result,
                    }),
                );
            }
            self.core.context.log(|l| {
                l.log_tool_execution(
                    &call.name,
                    &call.arguments,
                    &result,
                    !result.starts_with("Error:"),
                )
            });

            let observation = self.core.limit_observation(result);
            self.core.record_observation(call, &observation)?;
            observations.push(observation);
        }

        Ok(observations.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{drain, echo_call, recording_context, ScriptedModel};
    use super::*;
    use crate::llm::{FunctionCallType, ToolCallResponse};
    use crate::memory::Role;
    use crate::memory::STRUCT_PARSE_RESULT_MARKER;

    fn agent_with(
        responses: Vec<anyhow::Result<ToolCallResponse>>,
        config: &Configuration,
    ) -> (
        ReactAgent,
        Arc<ScriptedModel>,
        tokio::sync::mpsc::UnboundedReceiver<crate::sequencer::EventMessage>,
    ) {
        let (ctx, _printer, rx) = recording_context("say hi");
        let model = Arc::new(ScriptedModel::with_responses(responses));
        let agent = ReactAgent::react(Arc::new(ctx), model.clone(), config);
        (agent, model, rx)
    }

    #[tokio::test]
    async fn test_direct_answer_finishes() {
        let config = Configuration::default();
        let (mut agent, model, mut rx) =
            agent_with(vec![Ok(ToolCallResponse::text("Hi there"))], &config);

        let output = agent.run("say hi").await.unwrap();

        assert_eq!(output, "Hi there");
        assert_eq!(agent.state(), AgentState::Finished);
        assert_eq!(model.request_count(), 1);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message_type, "tool_thought");
    }

    #[tokio::test]
    async fn test_tool_results_follow_call_order() {
        let config = Configuration::default();
        let calls = vec![echo_call("c1", "one"), echo_call("c2", "two"), echo_call("c3", "three")];
        let (mut agent, _model, mut rx) = agent_with(
            vec![
                Ok(ToolCallResponse::with_calls("", calls)),
                Ok(ToolCallResponse::text("All echoed")),
            ],
            &config,
        );

        let output = agent.run("say hi").await.unwrap();
        assert_eq!(output, "All echoed");

        let roles: Vec<Role> = agent.core().memory.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Tool,
                Role::Tool,
                Role::User,
                Role::Assistant
            ]
        );
        let tool_ids: Vec<_> = agent.core().memory.messages()[2..5]
            .iter()
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(tool_ids, vec!["c1", "c2", "c3"]);
        assert_eq!(agent.core().memory.messages()[3].content, "echo: two");

        let results: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| e.message_type == "tool_result")
            .map(|e| e.result_map["toolResult"].clone())
            .collect();
        assert_eq!(results, vec![json!("echo: one"), json!("echo: two"), json!("echo: three")]);
    }

    #[tokio::test]
    async fn test_model_failure_finishes_gracefully() {
        let config = Configuration::default();
        let (mut agent, _model, _rx) =
            agent_with(vec![Err(anyhow::anyhow!("upstream 503"))], &config);

        let output = agent.run("say hi").await.unwrap();

        assert_eq!(output, super::super::NO_ACTION_NEEDED);
        assert_eq!(agent.state(), AgentState::Finished);
        let last = agent.core().memory.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert!(last.content.contains("upstream 503"));
    }

    #[tokio::test]
    async fn test_struct_parse_folds_results() {
        let mut config = Configuration::default();
        config.llm.function_call_type = FunctionCallType::StructParse;
        let (mut agent, _model, _rx) = agent_with(
            vec![
                Ok(ToolCallResponse::with_calls(
                    "calling echo",
                    vec![echo_call("c1", "a"), echo_call("c2", "b")],
                )),
                Ok(ToolCallResponse::text("done")),
            ],
            &config,
        );

        agent.run("say hi").await.unwrap();

        let messages = agent.core().memory.messages();
        assert!(messages.iter().all(|m| m.role != Role::Tool));
        assert!(messages[1].tool_calls.is_none());
        assert_eq!(
            messages[1].content,
            format!(
                "calling echo{}echo: a{}echo: b",
                STRUCT_PARSE_RESULT_MARKER, STRUCT_PARSE_RESULT_MARKER
            )
        );
    }

    #[tokio::test]
    async fn test_observation_limit_and_silent_tools() {
        let mut config = Configuration::default();
        config.react.max_observe = Some(6);
        config.tools.silent_tools = vec!["echo".to_string()];
        let (mut agent, _model, mut rx) = agent_with(
            vec![
                Ok(ToolCallResponse::with_calls("", vec![echo_call("c1", "long text")])),
                Ok(ToolCallResponse::text("ok")),
            ],
            &config,
        );

        agent.run("say hi").await.unwrap();

        assert_eq!(agent.core().memory.messages()[2].content, "echo: ");
        assert!(drain(&mut rx).iter().all(|e| e.message_type != "tool_result"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let config = Configuration::default();
        let (mut agent, _model, _rx) = agent_with(
            vec![
                Ok(ToolCallResponse::with_calls("", vec![ToolCall::new("c1", "nope", "{}")])),
                Ok(ToolCallResponse::text("gave up")),
            ],
            &config,
        );

        let output = agent.run("say hi").await.unwrap();
        assert_eq!(output, "gave up");
        assert_eq!(
            agent.core().memory.messages()[2].content,
            "Error: unknown tool 'nope'"
        );
    }

    #[tokio::test]
    async fn test_fork_copies_memory() {
        let config = Configuration::default();
        let (mut agent, _model, _rx) = agent_with(vec![], &config);
        agent.run("say hi").await.unwrap();

        let mut fork = agent.fork();
        assert_eq!(fork.core().current_step, 0);
        assert_eq!(fork.core().memory.len(), agent.core().memory.len());

        fork.run("another").await.unwrap();
        assert!(fork.core().memory.len() > agent.core().memory.len());
        assert_eq!(agent.core().memory.len(), 2);
    }

    #[tokio::test]
    async fn test_executor_renders_task() {
        let config = Configuration::default();
        let (ctx, _printer, _rx) = recording_context("build a site");
        let model = Arc::new(ScriptedModel::new());
        let mut executor = ReactAgent::executor(Arc::new(ctx), model.clone(), &config);

        executor.run("Your task is: write index.html").await.unwrap();

        let requests = model.requests.lock().unwrap();
        let system = requests[0].system.as_ref().unwrap();
        assert!(system.content.contains("Current task: Your task is: write index.html"));
        assert!(system.content.contains("tool: echo"));
        assert_eq!(executor.task(), Some("Your task is: write index.html"));
    }
}
