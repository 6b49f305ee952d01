//! Ordered event sequencing for streamed run output.
//!
//! Agents emit loosely ordered events (thoughts, plans, task boundaries,
//! tool results) from possibly concurrent producers. [`EventSequencer`]
//! stamps each one with a task id and monotonic order numbers so a
//! client can render the stream deterministically, and commits final
//! payloads into a [`RunSnapshot`].
//!
//! One sequencer belongs to exactly one run; it is never shared between
//! runs.
//!
//! ## Numbering rules
//!
//! - `plan_thought`: run-global counter, no task.
//! - first `plan`: order 1, no task (the initial plan).
//! - later `plan`: re-labelled `task`, attached to the current task, order 1.
//! - `task`: allocates a fresh task id, order 1.
//! - `result`: order 1, `finish = true`.
//! - anything else: attached to the current task; recurring types count
//!   up per (task, type), other types keep order 1.

mod printer;

pub use printer::{Printer, SequencedPrinter, TracingPrinter};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Message types that may legitimately recur within one task.
pub const DEFAULT_STREAM_MESSAGE_TYPES: &[&str] = &[
    "tool_thought",
    "tool_result",
    "html",
    "markdown",
    "deep_search",
    "agent_stream",
];

/// Well-known message types.
pub mod message_type {
    /// Planner reasoning text.
    pub const PLAN_THOUGHT: &str = "plan_thought";
    /// Plan object.
    pub const PLAN: &str = "plan";
    /// Task boundary.
    pub const TASK: &str = "task";
    /// Executor reasoning text.
    pub const TOOL_THOUGHT: &str = "tool_thought";
    /// Tool execution result.
    pub const TOOL_RESULT: &str = "tool_result";
    /// Terminal run result.
    pub const RESULT: &str = "result";
}

/// An unsequenced event handed to the sequencer.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentEvent {
    /// Caller-assigned message id; streaming partials of one message share it.
    pub message_id: String,
    /// Event type, e.g. `tool_result`.
    pub message_type: String,
    /// Structured payload.
    pub payload: Value,
    /// Whether this is the authoritative value for its slot.
    pub is_final: bool,
}

impl AgentEvent {
    /// Create an event with a fresh message id.
    pub fn new(message_type: impl Into<String>, payload: Value, is_final: bool) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            message_type: message_type.into(),
            payload,
            is_final,
        }
    }

    /// Set an explicit message id.
    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }
}

/// A sequenced event, ready for transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    /// Task the event belongs to; absent for run-level events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Run-wide position among task-attached events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_order: Option<u64>,
    /// Message id.
    pub message_id: String,
    /// Event type after re-labelling.
    pub message_type: String,
    /// Position within the (task, type) scope.
    pub message_order: u64,
    /// Whether the payload is final.
    pub is_final: bool,
    /// Whether this event ends the run.
    pub finish: bool,
    /// Payload.
    pub result_map: Value,
}

/// Committed state of one task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    /// Task id.
    pub task_id: String,
    /// Final `task` payload, if one was committed.
    pub task: Value,
    /// Final payloads of events attached to the task, in arrival order.
    pub sub_tasks: Vec<Value>,
}

/// Final payloads committed during a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    /// First final planner thought.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_thought: Option<Value>,
    /// Initial plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    /// Tasks in creation order.
    pub tasks: Vec<TaskSnapshot>,
    /// Terminal result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Per-run ordering state.
#[derive(Debug, Clone)]
pub struct EventLedger {
    task_id: Option<String>,
    task_order: u64,
    orders: HashMap<String, u64>,
    init_plan: bool,
}

impl Default for EventLedger {
    fn default() -> Self {
        Self {
            task_id: None,
            task_order: 0,
            orders: HashMap::new(),
            init_plan: true,
        }
    }
}

impl EventLedger {
    /// Current task id, if any task has been opened.
    pub fn task_id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    /// Open a new task and make it current.
    fn renew_task_id(&mut self) -> String {
        if let Some(old) = self.task_id.take() {
            let prefix = format!("{}:", old);
            self.orders.retain(|key, _| !key.starts_with(&prefix));
        }
        let id = Uuid::new_v4().to_string();
        self.task_id = Some(id.clone());
        id
    }

    /// Current task id, opening one if none exists yet.
    fn current_task_id(&mut self) -> String {
        if let Some(id) = &self.task_id {
            return id.clone();
        }
        self.renew_task_id()
    }

    fn next_task_order(&mut self) -> u64 {
        self.task_order += 1;
        self.task_order
    }

    fn next_order(&mut self, key: &str) -> u64 {
        let counter = self.orders.entry(key.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// True exactly once: for the first plan event of the run.
    fn take_init_plan(&mut self) -> bool {
        std::mem::replace(&mut self.init_plan, false)
    }
}

/// Assigns task ids and order numbers to a run's events.
#[derive(Debug, Clone)]
pub struct EventSequencer {
    ledger: EventLedger,
    stream_types: HashSet<String>,
    snapshot: RunSnapshot,
}

impl Default for EventSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSequencer {
    /// Create a sequencer with the default recurring message types.
    pub fn new() -> Self {
        Self::with_stream_types(DEFAULT_STREAM_MESSAGE_TYPES.iter().map(|s| s.to_string()))
    }

    /// Create a sequencer with a custom set of recurring message types.
    pub fn with_stream_types<I: IntoIterator<Item = String>>(types: I) -> Self {
        Self {
            ledger: EventLedger::default(),
            stream_types: types.into_iter().collect(),
            snapshot: RunSnapshot::default(),
        }
    }

    /// Ordering state.
    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    /// Payloads committed so far.
    pub fn snapshot(&self) -> &RunSnapshot {
        &self.snapshot
    }

    fn task_snapshot(&mut self, task_id: &str) -> &mut TaskSnapshot {
        let pos = match self.snapshot.tasks.iter().position(|t| t.task_id == task_id) {
            Some(pos) => pos,
            None => {
                self.snapshot.tasks.push(TaskSnapshot {
                    task_id: task_id.to_string(),
                    ..TaskSnapshot::default()
                });
                self.snapshot.tasks.len() - 1
            }
        };
        &mut self.snapshot.tasks[pos]
    }

    /// Stamp one event and commit its payload if it is final.
    pub fn sequence(&mut self, event: AgentEvent) -> EventMessage {
        let AgentEvent {
            message_id,
            message_type: kind,
            payload,
            is_final,
        } = event;

        let mut message = EventMessage {
            task_id: None,
            task_order: None,
            message_id,
            message_type: kind.clone(),
            message_order: 1,
            is_final,
            finish: false,
            result_map: Value::Null,
        };

        match kind.as_str() {
            message_type::PLAN_THOUGHT => {
                message.message_order = self.ledger.next_order(message_type::PLAN_THOUGHT);
                if is_final && self.snapshot.plan_thought.is_none() {
                    self.snapshot.plan_thought = Some(payload.clone());
                }
            }
            message_type::PLAN if self.ledger.take_init_plan() => {
                if is_final {
                    self.snapshot.plan = Some(payload.clone());
                }
            }
            message_type::PLAN => {
                let task_id = self.ledger.current_task_id();
                message.task_order = Some(self.ledger.next_task_order());
                message.message_type = message_type::TASK.to_string();
                if is_final {
                    self.task_snapshot(&task_id).sub_tasks.push(payload.clone());
                }
                message.task_id = Some(task_id);
            }
            message_type::TASK => {
                let task_id = self.ledger.renew_task_id();
                message.task_order = Some(self.ledger.next_task_order());
                let entry = self.task_snapshot(&task_id);
                if is_final {
                    entry.task = payload.clone();
                }
                message.task_id = Some(task_id);
            }
            message_type::RESULT => {
                message.finish = true;
                if is_final {
                    self.snapshot.result = Some(payload.clone());
                }
            }
            other => {
                let task_id = self.ledger.current_task_id();
                message.task_order = Some(self.ledger.next_task_order());
                if self.stream_types.contains(other) {
                    message.message_order =
                        self.ledger.next_order(&format!("{}:{}", task_id, other));
                }
                if is_final {
                    self.task_snapshot(&task_id).sub_tasks.push(payload.clone());
                }
                message.task_id = Some(task_id);
            }
        }

        message.result_map = payload;
        message
    }
}
