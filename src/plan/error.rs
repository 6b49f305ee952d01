//! Error types for plan manipulation.

use thiserror::Error;

/// Errors raised while building or updating a plan.
///
/// These are invariant violations; callers fail fast instead of coercing
/// malformed plan data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// The positional arrays of a plan disagree in length.
    #[error("Plan arrays out of sync: {steps} steps, {statuses} statuses, {notes} notes")]
    LengthMismatch {
        /// Number of steps.
        steps: usize,
        /// Number of statuses.
        statuses: usize,
        /// Number of notes.
        notes: usize,
    },

    /// A step index outside the plan was referenced.
    #[error("Step index {index} out of range (plan has {len} steps)")]
    StepIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of steps.
        len: usize,
    },

    /// Unknown step status string.
    #[error("Invalid step status '{0}': expected not_started, in_progress or completed")]
    InvalidStatus(String),

    /// A planning command was missing a required parameter.
    #[error("Parameter '{parameter}' is required for command '{command}'")]
    MissingParameter {
        /// Planning command.
        command: String,
        /// Missing parameter.
        parameter: String,
    },

    /// Unrecognized planning command.
    #[error("Unknown planning command '{0}': expected create, update, mark_step or finish")]
    UnknownCommand(String),

    /// An operation required a plan but none has been created yet.
    #[error("No plan exists yet; create one first")]
    NoPlan,
}

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;
