//! Per-run context shared by every agent of a run.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observability::Logger;
use crate::orchestration::AgentType;
use crate::registry::ToolRegistry;
use crate::sequencer::Printer;

/// A file produced during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// File name as shown to the model and the user.
    pub file_name: String,
    /// Short description of the contents.
    pub description: String,
    /// Where the file can be fetched, when it is stored remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Internal files are hidden from prompts that filter them.
    #[serde(default)]
    pub is_internal: bool,
}

impl FileInfo {
    /// Create a user-visible file record.
    pub fn new(file_name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            description: description.into(),
            url: None,
            is_internal: false,
        }
    }

    /// Mark the file as internal.
    pub fn internal(mut self) -> Self {
        self.is_internal = true;
        self
    }

    /// Attach a download location.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Render `files` as `name: description` lines for the `{{files}}` placeholder.
pub fn format_file_info(files: &[FileInfo], filter_internal: bool) -> String {
    files
        .iter()
        .filter(|f| !(filter_internal && f.is_internal))
        .map(|f| format!("{}: {}\n", f.file_name, f.description))
        .collect()
}

/// Everything an agent needs to know about the run it belongs to.
///
/// Created once per run by the caller and shared through an `Arc` by the
/// planner, the executor and any forked executor copies. The file lists
/// and the current task are the only mutable parts.
pub struct AgentContext {
    pub request_id: String,
    pub session_id: String,
    pub query: String,
    pub date_info: String,
    pub sop_prompt: String,
    pub base_prompt: String,
    pub agent_type: AgentType,
    pub is_stream: bool,
    pub printer: Arc<dyn Printer>,
    pub tools: ToolRegistry,
    pub logger: Option<Arc<Logger>>,
    product_files: Mutex<Vec<FileInfo>>,
    task_product_files: Mutex<Vec<FileInfo>>,
    current_task: Mutex<Option<String>>,
}

impl fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentContext")
            .field("request_id", &self.request_id)
            .field("session_id", &self.session_id)
            .field("query", &self.query)
            .field("agent_type", &self.agent_type)
            .field("is_stream", &self.is_stream)
            .field("tools", &self.tools.tool_names())
            .finish()
    }
}

impl AgentContext {
    /// Create a context for one run.
    ///
    /// # Arguments
    /// * `request_id` - Identifier used to correlate logs and events.
    /// * `query` - The user's request.
    /// * `printer` - Sink for the run's events.
    /// * `tools` - Tools available to the run's agents.
    pub fn new(
        request_id: impl Into<String>,
        query: impl Into<String>,
        printer: Arc<dyn Printer>,
        tools: ToolRegistry,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            session_id: Uuid::new_v4().to_string(),
            query: query.into(),
            date_info: chrono::Local::now().format("%Y-%m-%d %A").to_string(),
            sop_prompt: String::new(),
            base_prompt: String::new(),
            agent_type: AgentType::default(),
            is_stream: false,
            printer,
            tools,
            logger: None,
            product_files: Mutex::new(Vec::new()),
            task_product_files: Mutex::new(Vec::new()),
            current_task: Mutex::new(None),
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn with_agent_type(mut self, agent_type: AgentType) -> Self {
        self.agent_type = agent_type;
        self
    }

    pub fn with_date_info(mut self, date_info: impl Into<String>) -> Self {
        self.date_info = date_info.into();
        self
    }

    pub fn with_sop_prompt(mut self, sop_prompt: impl Into<String>) -> Self {
        self.sop_prompt = sop_prompt.into();
        self
    }

    pub fn with_base_prompt(mut self, base_prompt: impl Into<String>) -> Self {
        self.base_prompt = base_prompt.into();
        self
    }

    /// Whether the model client streams thoughts itself.
    pub fn with_stream(mut self, is_stream: bool) -> Self {
        self.is_stream = is_stream;
        self
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn lock<T>(slot: &Mutex<T>) -> MutexGuard<'_, T> {
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a file produced by a tool, for the run and the current iteration.
    pub fn add_product_file(&self, file: FileInfo) {
        Self::lock(&self.task_product_files).push(file.clone());
        Self::lock(&self.product_files).push(file);
    }

    /// Files produced so far in the run, oldest first.
    pub fn product_files(&self) -> Vec<FileInfo> {
        Self::lock(&self.product_files).clone()
    }

    /// Files produced during the current Plan-Execute iteration.
    pub fn task_product_files(&self) -> Vec<FileInfo> {
        Self::lock(&self.task_product_files).clone()
    }

    /// Start a new iteration's file list.
    pub fn clear_task_product_files(&self) {
        Self::lock(&self.task_product_files).clear();
    }

    pub fn set_current_task(&self, task: impl Into<String>) {
        *Self::lock(&self.current_task) = Some(task.into());
    }

    /// Sub-task most recently handed to an executor.
    pub fn current_task(&self) -> Option<String> {
        Self::lock(&self.current_task).clone()
    }

    /// Run a closure against the run logger, if one is attached.
    ///
    /// Transcript failures are reported through `tracing` and never fail
    /// the run.
    pub(crate) fn log(&self, f: impl FnOnce(&Logger) -> anyhow::Result<()>) {
        if let Some(logger) = &self.logger {
            if let Err(e) = f(logger) {
                tracing::warn!(request_id = %self.request_id, "Failed to write run log: {:#}", e);
            }
        }
    }
}
