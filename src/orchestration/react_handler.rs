//! Handler for single-agent ReAct runs.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::agent::{Agent, AgentContext, AgentResult, ReactAgent, SummaryAgent};
use crate::config::Configuration;
use crate::llm::ModelClient;
use crate::sequencer::message_type;

use super::{fail, AgentHandler, AgentType};

/// Runs the query on one [`ReactAgent`] and summarizes its memory.
///
/// A run that stops on its step budget is still summarized: the summary
/// reports whatever progress was made.
pub struct ReactHandler {
    llm: Arc<dyn ModelClient>,
    config: Arc<Configuration>,
}

impl ReactHandler {
    pub fn new(llm: Arc<dyn ModelClient>, config: Arc<Configuration>) -> Self {
        Self { llm, config }
    }
}

#[async_trait]
impl AgentHandler for ReactHandler {
    fn support(&self, agent_type: AgentType) -> bool {
        agent_type == AgentType::React
    }

    async fn handle(&self, context: Arc<AgentContext>, query: &str) -> AgentResult<Value> {
        context.log(|l| l.log_run_start(&context.request_id, AgentType::React.as_str(), query));

        let mut agent = ReactAgent::react(context.clone(), self.llm.clone(), &self.config);
        if let Err(e) = agent.run(query).await {
            return Err(fail(&context, &self.config.summary.failure_summary, e));
        }
        info!(
            request_id = %context.request_id,
            state = %agent.state(),
            steps = agent.core().current_step,
            "ReAct run finished"
        );

        let summary = SummaryAgent::new(context.clone(), self.llm.clone(), &self.config);
        let payload = summary
            .result_payload(agent.core().memory.messages(), query)
            .await;
        context.printer.send_final(message_type::RESULT, payload.clone());
        context.log(|l| l.log_completion(agent.state().as_str()));
        Ok(payload)
    }
}
