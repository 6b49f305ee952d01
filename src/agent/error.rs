//! Error types for agent runs.

use thiserror::Error;

use crate::plan::PlanError;

/// Errors that abort an agent step.
///
/// Tool failures and model-call failures are not represented here: the
/// former become observation strings and the latter finish the agent.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Memory was inspected before any message was appended.
    #[error("Memory is empty")]
    EmptyMemory,

    /// A role name did not match any known role.
    #[error("Unsupported message role '{0}'")]
    UnsupportedRole(String),

    /// A tool message was built without the id of the call it answers.
    #[error("Tool message requires a tool call id")]
    MissingToolCallId,

    /// The plan was edited into an invalid state.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// A collaborator call failed where the failure cannot be absorbed.
    #[error("Model call failed: {0}")]
    Model(String),

    /// A step failed for a reason outside the categories above.
    #[error("Step failed: {0}")]
    StepFailed(String),

    /// A forked sub-executor task panicked or was cancelled.
    #[error("Sub-task join failed: {0}")]
    TaskJoin(String),
}

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;
