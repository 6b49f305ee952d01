//! Built-in `planning` tool the planner uses to create and edit its plan.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::memory::ToolArguments;
use crate::registry::LocalTool;

use super::{Plan, PlanError, PlanResult, StepStatus};

/// Name under which the planning tool is registered.
pub const PLANNING_TOOL_NAME: &str = "planning";

#[derive(Debug, Deserialize)]
struct PlanningArgs {
    command: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    steps: Option<Vec<String>>,
    #[serde(default)]
    step_index: Option<usize>,
    #[serde(default)]
    step_status: Option<String>,
    #[serde(default)]
    step_notes: Option<String>,
}

/// Planning tool operating on a plan shared with its owning agent.
///
/// Clones share the same plan slot.
#[derive(Debug, Clone, Default)]
pub struct PlanningTool {
    plan: Arc<Mutex<Option<Plan>>>,
}

impl PlanningTool {
    /// Create a planning tool with no plan yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<Plan>> {
        self.plan.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current plan, if one has been created.
    pub fn plan(&self) -> Option<Plan> {
        self.slot().clone()
    }

    /// Whether a plan has been created.
    pub fn has_plan(&self) -> bool {
        self.slot().is_some()
    }

    /// Apply `f` to the current plan.
    pub fn with_plan<T>(&self, f: impl FnOnce(&mut Plan) -> PlanResult<T>) -> PlanResult<T> {
        let mut slot = self.slot();
        let plan = slot.as_mut().ok_or(PlanError::NoPlan)?;
        f(plan)
    }

    /// Advance the current plan by one step.
    pub fn step_plan(&self) -> PlanResult<()> {
        self.with_plan(Plan::step_plan)
    }

    fn run_command(&self, args: PlanningArgs) -> PlanResult<String> {
        let missing = |parameter: &str| PlanError::MissingParameter {
            command: args.command.clone(),
            parameter: parameter.to_string(),
        };

        match args.command.as_str() {
            "create" => {
                let steps = args.steps.clone().ok_or_else(|| missing("steps"))?;
                let title = args.title.clone().unwrap_or_default();
                let plan = Plan::create(title, steps);
                let rendered = plan.to_string();
                *self.slot() = Some(plan);
                Ok(format!("Plan created successfully\n\n{}", rendered))
            }
            "update" => self.with_plan(|plan| {
                plan.update(args.title.clone(), args.steps.clone())?;
                Ok(format!("Plan updated successfully\n\n{}", plan))
            }),
            "mark_step" => {
                let index = args.step_index.ok_or_else(|| missing("step_index"))?;
                let status = args
                    .step_status
                    .as_deref()
                    .map(str::parse::<StepStatus>)
                    .transpose()?;
                self.with_plan(|plan| {
                    plan.mark_step(index, status, args.step_notes.clone())?;
                    Ok(format!("Step {} updated\n\n{}", index, plan))
                })
            }
            "finish" => self.with_plan(|plan| {
                plan.finish();
                Ok(format!("Plan finished\n\n{}", plan))
            }),
            other => Err(PlanError::UnknownCommand(other.to_string())),
        }
    }
}

#[async_trait]
impl LocalTool for PlanningTool {
    fn name(&self) -> &str {
        PLANNING_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Create and manage the task plan: create a plan, update its steps, mark step status, or finish it."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": ["create", "update", "mark_step", "finish"],
                    "description": "Operation to perform"
                },
                "title": {"type": "string", "description": "Plan title"},
                "steps": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Ordered steps, e.g. \"Step 1. Research: collect sources\""
                },
                "step_index": {"type": "integer", "description": "Zero-based step index"},
                "step_status": {
                    "type": "string",
                    "enum": ["not_started", "in_progress", "completed"]
                },
                "step_notes": {"type": "string"}
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, args: ToolArguments) -> anyhow::Result<String> {
        let args: PlanningArgs = args.parse()?;
        Ok(self.run_command(args)?)
    }
}
