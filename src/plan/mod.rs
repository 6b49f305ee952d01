//! Task plans for Plan-Execute runs.
//!
//! A [`Plan`] is an ordered list of sub-tasks with positional status and
//! notes. The planner edits it through the built-in [`PlanningTool`] and
//! reads the active sub-task(s) back with [`Plan::current_step`].

mod error;
#[allow(clippy::module_inception)]
mod plan;
mod tool;

pub use error::{PlanError, PlanResult};
pub use plan::{Plan, StepStatus, STEP_SEPARATOR};
pub use tool::{PlanningTool, PLANNING_TOOL_NAME};
