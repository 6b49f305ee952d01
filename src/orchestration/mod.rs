//! Orchestration Module
//!
//! Handlers own the outer loop of a run: they build the agents for the
//! requested [`AgentType`], drive them, and emit exactly one terminal
//! `result` event per run (success summary, truncation notice or failure
//! notice).
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ark::orchestration::{AgentHandlerFactory, AgentType};
//!
//! let factory = AgentHandlerFactory::with_defaults(llm, config.clone());
//! let tools = ark::orchestration::prepare_tools(&config, local_tools).await;
//! let (printer, events) = ark::orchestration::sequenced_printer("req-1", &config);
//! let context = Arc::new(
//!     AgentContext::new("req-1", "write a report", printer, tools)
//!         .with_agent_type(AgentType::PlanSolve),
//! );
//! let outcome = factory.dispatch(context).await?;
//! ```

mod plan_solve;
mod react_handler;

pub use plan_solve::{run_parallel_tasks, PlanSolveHandler};
pub use react_handler::ReactHandler;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use crate::agent::{AgentContext, AgentError, AgentResult};
use crate::config::Configuration;
use crate::llm::ModelClient;
use crate::registry::{LocalTool, ToolRegistry};
use crate::sequencer::{message_type, EventMessage, EventSequencer, SequencedPrinter};

/// Terminal payload emitted when a run gives up after its iteration or
/// step budget.
pub const TRUNCATION_NOTICE: &str =
    "Reached the maximum number of iterations, the task has been terminated.";

/// Kind of agent requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum AgentType {
    Comprehensive = 1,
    Workflow = 2,
    PlanSolve = 3,
    Router = 4,
    #[default]
    React = 5,
}

impl AgentType {
    /// Numeric code used by callers and the `ARK_AGENT_TYPE` override.
    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Comprehensive),
            2 => Some(Self::Workflow),
            3 => Some(Self::PlanSolve),
            4 => Some(Self::Router),
            5 => Some(Self::React),
            _ => None,
        }
    }

    /// Agent type for a run: `override_code` (e.g. from `ARK_AGENT_TYPE`)
    /// if given, else `[agent] default_agent_type`. Unknown codes fall back
    /// to [`AgentType::React`].
    pub fn resolve(config: &Configuration, override_code: Option<u8>) -> Self {
        let code = override_code.unwrap_or(config.agent.default_agent_type);
        Self::from_u8(code).unwrap_or_else(|| {
            warn!("Unknown agent type {}, using {}", code, Self::React);
            Self::React
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Comprehensive => "comprehensive",
            Self::Workflow => "workflow",
            Self::PlanSolve => "plan_solve",
            Self::Router => "router",
            Self::React => "react",
        }
    }
}

impl TryFrom<u8> for AgentType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_u8(value).ok_or(value)
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runs one kind of agent for a request.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Whether this handler serves `agent_type`.
    fn support(&self, agent_type: AgentType) -> bool;

    /// Drive a run to completion and return the terminal `result` payload.
    ///
    /// Fatal errors are emitted as a failure notice before being returned.
    async fn handle(&self, context: Arc<AgentContext>, query: &str) -> AgentResult<Value>;
}

/// Ordered set of handlers; the first one supporting a type wins.
#[derive(Default)]
pub struct AgentHandlerFactory {
    handlers: Vec<Arc<dyn AgentHandler>>,
}

impl AgentHandlerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory with the ReAct and Plan-Execute handlers registered.
    pub fn with_defaults(llm: Arc<dyn ModelClient>, config: Arc<Configuration>) -> Self {
        let mut factory = Self::new();
        factory.register(Arc::new(ReactHandler::new(llm.clone(), config.clone())));
        factory.register(Arc::new(PlanSolveHandler::new(llm, config)));
        factory
    }

    pub fn register(&mut self, handler: Arc<dyn AgentHandler>) {
        self.handlers.push(handler);
    }

    /// First handler supporting `agent_type`, if any.
    pub fn handler(&self, agent_type: AgentType) -> Option<Arc<dyn AgentHandler>> {
        self.handlers
            .iter()
            .find(|h| h.support(agent_type))
            .cloned()
    }

    /// Run `context.query` with the handler for `context.agent_type` and close
    /// the printer afterwards.
    ///
    /// Returns `Ok(None)` when no handler supports the requested type.
    pub async fn dispatch(&self, context: Arc<AgentContext>) -> AgentResult<Option<Value>> {
        let request_id = context.request_id.clone();
        let Some(handler) = self.handler(context.agent_type) else {
            warn!(request_id = %request_id, "No handler for agent type {}", context.agent_type);
            return Ok(None);
        };

        info!(request_id = %request_id, agent_type = %context.agent_type, "Dispatching run");
        let query = context.query.clone();
        let outcome = handler.handle(context.clone(), &query).await;
        context.printer.close();
        outcome.map(Some)
    }
}

impl fmt::Debug for AgentHandlerFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandlerFactory")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Emit a failure notice and hand the error back.
pub(crate) fn fail(context: &AgentContext, notice: &str, err: AgentError) -> AgentError {
    tracing::error!(request_id = %context.request_id, "Run failed: {}", err);
    context.log(|l| l.log_error(&err.to_string(), None));
    context.printer.send_final(message_type::RESULT, Value::String(notice.to_string()));
    err
}

/// Build the tool registry for a run from `local_tools` and the remote
/// section of `config`.
///
/// Remote discovery failures are logged and skipped; the run continues with
/// whatever tools were found.
pub async fn prepare_tools(
    config: &Configuration,
    local_tools: Vec<Arc<dyn LocalTool>>,
) -> ToolRegistry {
    let registry = ToolRegistry::new();
    for tool in local_tools {
        if let Err(e) = registry.register_local(tool) {
            warn!("Skipping local tool: {}", e);
        }
    }

    #[cfg(feature = "remote")]
    if let Some(client_url) = config.remote.client_url.as_deref() {
        registry.set_remote_proxy(Arc::new(crate::registry::HttpRemoteToolProxy::new(
            client_url,
            config.remote.timeout_seconds,
        )));
    }

    for server in &config.remote.servers {
        match registry.discover_remote(server).await {
            Ok(count) => info!("Discovered {} tools on {}", count, server),
            Err(e) => warn!("Tool discovery failed for {}: {}", server, e),
        }
    }
    registry
}

/// Sequenced printer for one run, using the configured recurring types.
pub fn sequenced_printer(
    request_id: &str,
    config: &Configuration,
) -> (Arc<SequencedPrinter>, UnboundedReceiver<EventMessage>) {
    let sequencer =
        EventSequencer::with_stream_types(config.sequencer.stream_message_types.iter().cloned());
    let (printer, rx) = SequencedPrinter::new(request_id, sequencer);
    (Arc::new(printer), rx)
}
