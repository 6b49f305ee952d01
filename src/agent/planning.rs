//! Planner for Plan-Execute runs.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::Configuration;
use crate::llm::{ModelClient, ToolChoice};
use crate::memory::ToolCall;
use crate::plan::{Plan, PlanningTool, STEP_SEPARATOR};
use crate::prompt::{self, render_template, tools_prompt};
use crate::registry::ToolRegistry;
use crate::sequencer::message_type;

use super::{
    format_file_info, run_loop, Agent, AgentContext, AgentCore, AgentResult, AgentState,
    ReActAgent,
};

/// Planner output signalling that every plan step is completed.
pub const PLAN_FINISHED: &str = "finish";

fn step_prefix() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^Step\s*\d+\.\s?").ok())
        .as_ref()
}

/// Task text as shown to the user, without its `Step N.` prefix.
pub(crate) fn display_task(step: &str) -> String {
    match step_prefix() {
        Some(pattern) => pattern.replace(step, "").into_owned(),
        None => step.to_string(),
    }
}

/// Agent that creates and advances the task plan.
///
/// The planner only sees the built-in `planning` tool. Each run ends with
/// either the active sub-task(s), [`PLAN_FINISHED`], or an empty string
/// when it could not produce either.
#[derive(Debug)]
pub struct PlanningAgent {
    core: AgentCore,
    planning_tool: PlanningTool,
    tool_calls: Vec<ToolCall>,
    close_update: bool,
    plan_pre_prompt: String,
}

impl PlanningAgent {
    /// Planner for a run.
    pub fn new(
        context: Arc<AgentContext>,
        llm: Arc<dyn ModelClient>,
        config: &Configuration,
    ) -> Self {
        let settings = &config.planner;
        let planning_tool = PlanningTool::new();
        let tools = ToolRegistry::new();
        if let Err(e) = tools.register_local(Arc::new(planning_tool.clone())) {
            warn!(request_id = %context.request_id, "Failed to register planning tool: {}", e);
        }

        let executor_tools = tools_prompt(&context.tools.schemas());
        let render = |template: &str| {
            render_template(
                template,
                &[
                    ("tools", executor_tools.as_str()),
                    ("query", context.query.as_str()),
                    ("date", context.date_info.as_str()),
                    ("sopPrompt", context.sop_prompt.as_str()),
                ],
            )
        };
        let system_prompt = render(
            settings
                .system_prompt
                .as_deref()
                .unwrap_or(prompt::PLANNER_SYSTEM_PROMPT),
        );
        let next_step_prompt = render(
            settings
                .next_step_prompt
                .as_deref()
                .unwrap_or(prompt::PLANNER_NEXT_STEP_PROMPT),
        );

        let core = AgentCore::new("planner", context, llm, tools)
            .with_prompts(system_prompt, next_step_prompt)
            .with_max_steps(settings.max_steps)
            .with_max_observe(settings.max_observe)
            .with_function_call_type(config.llm.function_call_type)
            .with_temperature(config.llm.temperature)
            .with_timeout_seconds(config.llm.timeout_seconds);

        Self {
            core,
            planning_tool,
            tool_calls: Vec::new(),
            close_update: settings.close_update,
            plan_pre_prompt: settings.plan_pre_prompt.clone(),
        }
    }

    /// Copy of the current plan.
    pub fn plan(&self) -> Option<Plan> {
        self.planning_tool.plan()
    }

    /// Handle on the planning tool, sharing this planner's plan.
    pub fn planning_tool(&self) -> &PlanningTool {
        &self.planning_tool
    }

    /// Whether the plan is advanced without asking the model.
    pub fn is_static(&self) -> bool {
        self.close_update
    }

    /// Publish the plan and hand out the next sub-task(s).
    fn next_task(&mut self) -> String {
        let Some(plan) = self.planning_tool.plan() else {
            return String::new();
        };
        let rendered = plan.to_string();
        self.core.context.log(|l| l.log_plan(&rendered));
        let payload = serde_json::to_value(plan.formatted()).unwrap_or(Value::Null);

        if plan.all_complete() {
            info!(request_id = %self.core.context.request_id, "All plan steps completed");
            self.core.state = AgentState::Finished;
            self.core.emit(message_type::PLAN, payload);
            return PLAN_FINISHED.to_string();
        }

        let current = plan.current_step();
        if current.is_empty() {
            return String::new();
        }

        self.core.state = AgentState::Finished;
        self.core.emit(message_type::PLAN, payload);
        for step in current.split(STEP_SEPARATOR) {
            self.core.emit(message_type::TASK, json!(display_task(step)));
        }
        current
    }

    fn render(&self, template: &str) -> String {
        let files = format_file_info(&self.core.context.product_files(), false);
        render_template(template, &[("files", files.as_str())])
    }
}

#[async_trait]
impl Agent for PlanningAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    /// Think then act. A failed model call yields an empty output.
    async fn step(&mut self) -> AgentResult<String> {
        if !self.think().await? {
            return Ok(String::new());
        }
        self.act().await
    }

    async fn run(&mut self, query: &str) -> AgentResult<String> {
        if self.planning_tool.has_plan() || self.plan_pre_prompt.is_empty() {
            return run_loop(self, query).await;
        }
        let query = format!("{}{}", self.plan_pre_prompt, query);
        run_loop(self, &query).await
    }
}

#[async_trait]
impl ReActAgent for PlanningAgent {
    async fn think(&mut self) -> AgentResult<bool> {
        if self.close_update && self.planning_tool.has_plan() {
            self.planning_tool.step_plan()?;
            return Ok(true);
        }

        let system_prompt = self.render(&self.core.system_prompt);
        let next_step_prompt = self.render(&self.core.next_step_prompt);
        self.core.ensure_user_turn(&next_step_prompt)?;

        let request = self.core.tool_call_request(
            system_prompt,
            ToolChoice::Auto,
            message_type::PLAN_THOUGHT,
        );
        let llm = Arc::clone(&self.core.llm);
        let context = Arc::clone(&self.core.context);

        match llm.ask_tool(request).await {
            Ok(response) => {
                info!(
                    request_id = %context.request_id,
                    tool_calls = response.tool_calls.len(),
                    "planner thought: {}",
                    response.content
                );
                if !context.is_stream && !response.content.is_empty() {
                    self.core
                        .emit(message_type::PLAN_THOUGHT, json!(response.content));
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
        if self.close_update && self.planning_tool.has_plan() {
            return Ok(self.next_task());
        }

        let calls = std::mem::take(&mut self.tool_calls);
        let tools = self.core.tools.clone();
        let mut observations = Vec::with_capacity(calls.len());
        for call in &calls {
            let result = tools.execute_one(call).await;
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

        if self.planning_tool.has_plan() {
            if self.close_update {
                self.planning_tool.step_plan()?;
            }
            return Ok(self.next_task());
        }

        Ok(observations.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{drain, recording_context, ScriptedModel};
    use super::*;
    use crate::llm::ToolCallResponse;
    use crate::plan::StepStatus;

    fn create_call(steps: &[&str]) -> ToolCall {
        ToolCall::new(
            "p1",
            "planning",
            json!({"command": "create", "title": "Report", "steps": steps}).to_string(),
        )
    }

    fn mark_call(id: &str, index: usize, status: &str) -> ToolCall {
        ToolCall::new(
            id,
            "planning",
            json!({"command": "mark_step", "step_index": index, "step_status": status})
                .to_string(),
        )
    }

    #[test]
    fn test_display_task_strips_prefix() {
        assert_eq!(display_task("Step 2. Research: find data"), "Research: find data");
        assert_eq!(display_task("Step2.collect"), "collect");
        assert_eq!(display_task("collect"), "collect");
    }

    #[tokio::test]
    async fn test_static_plan_advances_without_model() {
        let mut config = Configuration::default();
        config.planner.close_update = true;
        config.planner.plan_pre_prompt = "Plan: ".to_string();
        let (ctx, _printer, mut rx) = recording_context("write a report");
        let model = Arc::new(ScriptedModel::with_responses(vec![Ok(
            ToolCallResponse::with_calls(
                "Splitting the work",
                vec![create_call(&["Step 1. Research: gather", "Step 2. Write: draft"])],
            ),
        )]));
        let mut planner = PlanningAgent::new(Arc::new(ctx), model.clone(), &config);

        let first = planner.run("write a report").await.unwrap();
        assert_eq!(first, "Step 1. Research: gather");
        assert_eq!(planner.state(), AgentState::Finished);
        assert_eq!(
            planner.core().memory.messages()[0].content,
            "Plan: write a report"
        );

        let second = planner.run("gathered").await.unwrap();
        assert_eq!(second, "Step 2. Write: draft");
        let third = planner.run("drafted").await.unwrap();
        assert_eq!(third, PLAN_FINISHED);
        assert_eq!(model.request_count(), 1);
        assert_eq!(
            planner.core().memory.messages()[3].content,
            "gathered"
        );

        let types: Vec<String> = drain(&mut rx).into_iter().map(|e| e.message_type).collect();
        assert_eq!(
            types,
            vec!["plan_thought", "plan", "task", "task", "task", "task"]
        );
    }

    #[tokio::test]
    async fn test_dynamic_plan_follows_model() {
        let config = Configuration::default();
        let (ctx, printer, _rx) = recording_context("compare vendors");
        let model = Arc::new(ScriptedModel::with_responses(vec![
            Ok(ToolCallResponse::with_calls(
                "",
                vec![
                    create_call(&["Step 1. Collect: vendor A<sep>Step 1. Collect: vendor B"]),
                    mark_call("p2", 0, "in_progress"),
                ],
            )),
            Ok(ToolCallResponse::with_calls(
                "",
                vec![mark_call("p3", 0, "completed")],
            )),
        ]));
        let mut planner = PlanningAgent::new(Arc::new(ctx), model.clone(), &config);

        let first = planner.run("compare vendors").await.unwrap();
        assert_eq!(first, "Step 1. Collect: vendor A<sep>Step 1. Collect: vendor B");
        let snapshot = printer.snapshot();
        let tasks: Vec<Value> = snapshot.tasks.iter().map(|t| t.task.clone()).collect();
        assert!(tasks.contains(&json!("Collect: vendor B")));

        let second = planner.run("both collected").await.unwrap();
        assert_eq!(second, PLAN_FINISHED);
        assert_eq!(model.request_count(), 2);
        let plan = planner.plan().unwrap();
        assert_eq!(plan.step_status, vec![StepStatus::Completed]);
    }

    #[tokio::test]
    async fn test_model_failure_yields_empty_output() {
        let config = Configuration::default();
        let (ctx, _printer, _rx) = recording_context("anything");
        let model = Arc::new(ScriptedModel::with_responses(vec![Err(anyhow::anyhow!(
            "timeout"
        ))]));
        let mut planner = PlanningAgent::new(Arc::new(ctx), model, &config);

        let output = planner.run("anything").await.unwrap();
        assert_eq!(output, "");
        assert_eq!(planner.state(), AgentState::Finished);
        assert!(planner.plan().is_none());
    }

    #[tokio::test]
    async fn test_planner_only_offers_planning_tool() {
        let config = Configuration::default();
        let (ctx, _printer, _rx) = recording_context("anything");
        let model = Arc::new(ScriptedModel::new());
        let mut planner = PlanningAgent::new(Arc::new(ctx), model.clone(), &config);
        planner.core_mut().max_steps = 1;

        planner.run("anything").await.unwrap();

        let requests = model.requests.lock().unwrap();
        let names: Vec<&str> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["planning"]);
        assert_eq!(requests[0].stream_message_type, "plan_thought");
        assert!(requests[0].system.as_ref().unwrap().content.contains("tool: echo"));
    }
}
