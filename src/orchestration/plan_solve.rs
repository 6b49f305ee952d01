//! Handler for Plan-Execute runs.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::{
    Agent, AgentContext, AgentError, AgentResult, AgentState, PlanningAgent, ReactAgent,
    SummaryAgent, PLAN_FINISHED,
};
use crate::config::Configuration;
use crate::llm::ModelClient;
use crate::plan::STEP_SEPARATOR;
use crate::sequencer::message_type;

use super::{fail, AgentHandler, AgentType, TRUNCATION_NOTICE};

/// How the planner/executor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Finished,
    Truncated,
    Failed,
}

/// Alternates a [`PlanningAgent`] and an executor [`ReactAgent`] until the
/// plan is complete.
///
/// Each planner output names the active sub-task(s). Several sub-tasks
/// joined by `<sep>` run concurrently on forked executors whose new
/// messages are merged back in sub-task order.
pub struct PlanSolveHandler {
    llm: Arc<dyn ModelClient>,
    config: Arc<Configuration>,
}

impl PlanSolveHandler {
    pub fn new(llm: Arc<dyn ModelClient>, config: Arc<Configuration>) -> Self {
        Self { llm, config }
    }

    async fn drive(
        &self,
        context: &Arc<AgentContext>,
        planner: &mut PlanningAgent,
        executor: &mut ReactAgent,
        query: &str,
    ) -> AgentResult<Outcome> {
        let max_iterations = self.config.planner.max_steps;
        let prefix = self.config.executor.task_prefix.as_str();

        let mut planning_result = planner.run(query).await?;
        if let Some(outcome) = verdict(&planning_result, &[planner.state()]) {
            return Ok(outcome);
        }

        for iteration in 0..=max_iterations {
            let tasks: Vec<String> = planning_result
                .split(STEP_SEPARATOR)
                .map(|task| format!("{}{}", prefix, task))
                .collect();
            debug!(
                request_id = %context.request_id,
                iteration,
                tasks = tasks.len(),
                "Executing plan step"
            );

            context.clear_task_product_files();
            let executor_result = match tasks.as_slice() {
                [task] => executor.run(task).await?,
                _ => run_parallel_tasks(executor, &tasks).await?,
            };

            planning_result = planner.run(&executor_result).await?;
            if let Some(outcome) =
                verdict(&planning_result, &[planner.state(), executor.state()])
            {
                return Ok(outcome);
            }
        }

        warn!(
            request_id = %context.request_id,
            "Plan not finished after {} iterations",
            max_iterations
        );
        Ok(Outcome::Truncated)
    }
}

/// Decide whether the loop ends after a planner run.
fn verdict(planning_result: &str, states: &[AgentState]) -> Option<Outcome> {
    if planning_result == PLAN_FINISHED {
        return Some(Outcome::Finished);
    }
    if states.contains(&AgentState::Idle) {
        return Some(Outcome::Truncated);
    }
    if states.contains(&AgentState::Error) || planning_result.is_empty() {
        return Some(Outcome::Failed);
    }
    None
}

/// Run `tasks` concurrently on forks of `executor` and merge the results.
///
/// Every fork starts from a copy of the executor's memory. Once all forks
/// are done, the messages each one added are appended to the executor in
/// task order and the executor takes the state of the last fork. Outputs
/// are joined with `"\n"` in task order.
///
/// # Arguments
/// * `executor` - Parent executor; receives the merged memory.
/// * `tasks` - Sub-task queries, one fork each.
pub async fn run_parallel_tasks(
    executor: &mut ReactAgent,
    tasks: &[String],
) -> AgentResult<String> {
    let seed_len = executor.core().memory.len();
    let handles: Vec<_> = tasks
        .iter()
        .map(|task| {
            let mut fork = executor.fork();
            let task = task.clone();
            tokio::spawn(async move {
                let output = fork.run(&task).await;
                (fork, output)
            })
        })
        .collect();

    let mut outputs = Vec::with_capacity(tasks.len());
    let mut first_error = None;
    for joined in join_all(handles).await {
        let (fork, output) = match joined {
            Ok(done) => done,
            Err(e) => {
                first_error.get_or_insert(AgentError::TaskJoin(e.to_string()));
                continue;
            }
        };
        let added = fork.core().memory.messages_since(seed_len).to_vec();
        let core = executor.core_mut();
        core.memory.extend(added);
        core.state = fork.state();
        match output {
            Ok(text) => outputs.push(text),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    if let Some(e) = first_error {
        executor.core_mut().state = AgentState::Error;
        return Err(e);
    }
    Ok(outputs.join("\n"))
}

#[async_trait]
impl AgentHandler for PlanSolveHandler {
    fn support(&self, agent_type: AgentType) -> bool {
        agent_type == AgentType::PlanSolve
    }

    async fn handle(&self, context: Arc<AgentContext>, query: &str) -> AgentResult<Value> {
        context.log(|l| {
            l.log_run_start(&context.request_id, AgentType::PlanSolve.as_str(), query)
        });
        let failure_notice = self.config.summary.failure_summary.as_str();

        let mut planner = PlanningAgent::new(context.clone(), self.llm.clone(), &self.config);
        let mut executor = ReactAgent::executor(context.clone(), self.llm.clone(), &self.config);

        let outcome = match self
            .drive(&context, &mut planner, &mut executor, query)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => return Err(fail(&context, failure_notice, e)),
        };
        info!(
            request_id = %context.request_id,
            ?outcome,
            planner_steps = planner.core().current_step,
            executor_steps = executor.core().current_step,
            "Plan-Execute run ended"
        );

        let payload = match outcome {
            Outcome::Finished => {
                let summary = SummaryAgent::new(context.clone(), self.llm.clone(), &self.config);
                summary
                    .result_payload(executor.core().memory.messages(), query)
                    .await
            }
            Outcome::Truncated => Value::String(TRUNCATION_NOTICE.to_string()),
            Outcome::Failed => Value::String(failure_notice.to_string()),
        };
        context.printer.send_final(message_type::RESULT, payload.clone());
        context.log(|l| l.log_completion(&format!("{:?}", outcome)));
        Ok(payload)
    }
}
