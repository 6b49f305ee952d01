//! Agent Run Kit (ARK) - bounded agent loops for LLM tool use
//!
//! ARK drives a language model through tool-using runs and streams what
//! happens as ordered events:
//!
//! - **`memory`** - Conversation history and tool-call messages
//! - **`registry`** - Local and remote tools with concurrent fan-out
//! - **`plan`** - Task plans and the built-in `planning` tool
//! - **`agent`** - Step-bounded run loop, ReAct and planning agents, summaries
//! - **`orchestration`** - ReAct and Plan-Execute handlers
//! - **`sequencer`** - Task-scoped event numbering and output sinks
//! - **`config`** - TOML configuration and environment overrides
//! - **`observability`** - Markdown run transcripts
//!
//! The model itself is a collaborator: implement [`llm::ModelClient`] for
//! your provider.
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! ark = { version = "0.3", default-features = false }
//! # TOML/dotenv loading and the HTTP remote tool proxy:
//! ark = { version = "0.3", features = ["config", "remote"] }
//! ```
//!
//! # Example: Plan-Execute run
//!
//! ```ignore
//! use ark::prelude::*;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let loader = ConfigurationLoader::new(Some(Path::new("config/ark.toml")))?;
//! let config = Arc::new(loader.config);
//!
//! let tools = ark::orchestration::prepare_tools(&config, vec![Arc::new(SearchTool)]).await;
//! let (printer, mut events) = ark::orchestration::sequenced_printer("req-1", &config);
//! let context = Arc::new(
//!     AgentContext::new("req-1", "Compare the two vendors", printer, tools)
//!         .with_agent_type(AgentType::PlanSolve),
//! );
//!
//! let factory = AgentHandlerFactory::with_defaults(Arc::new(MyModel::new()), config);
//! tokio::spawn(async move { factory.dispatch(context).await });
//! while let Some(event) = events.recv().await {
//!     println!("{}", serde_json::to_string(&event)?);
//! }
//! ```

/// Conversation memory
pub mod memory;

/// Tool registry and dispatch
pub mod registry;

/// Task plans
pub mod plan;

/// Model client contract
pub mod llm;

/// Default prompts
pub mod prompt;

/// Event sequencing and output sinks
pub mod sequencer;

/// Agents and the run loop
pub mod agent;

/// Run handlers
pub mod orchestration;

/// Configuration management
pub mod config;

/// Run transcripts
pub mod observability;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{Configuration, ConfigurationLoader};

    #[cfg(feature = "config")]
    pub use crate::config::EnvironmentLoader;

    pub use crate::observability::Logger;

    pub use crate::agent::{
        Agent, AgentContext, AgentCore, AgentError, AgentResult, AgentState, FileInfo,
        PlanningAgent, ReactAgent, SummaryAgent,
    };

    pub use crate::llm::{ModelClient, ToolCallRequest, ToolCallResponse, ToolChoice};

    pub use crate::memory::{Memory, Message, Role, ToolArguments, ToolCall};

    pub use crate::orchestration::{AgentHandler, AgentHandlerFactory, AgentType};

    pub use crate::plan::{Plan, StepStatus};

    pub use crate::registry::{LocalTool, RemoteToolRef, ToolRegistry};

    pub use crate::sequencer::{EventMessage, EventSequencer, Printer, SequencedPrinter};
}
