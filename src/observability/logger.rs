//! Markdown transcript of agent runs.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn, Level};

/// Logger for agent runs.
///
/// This logger writes a markdown transcript per run: run start, steps,
/// model responses, tool executions, plan updates, errors and completion.
/// Every entry is also echoed through `tracing`. Entries more verbose than
/// the configured level are dropped: steps and model responses are written
/// at DEBUG, errors at ERROR, everything else at INFO. Writes are serialized
/// so concurrently running sub-executors can share one logger.
#[derive(Debug)]
pub struct Logger {
    log_file: PathBuf,
    log_level: String,
    level: Level,
    write_lock: Mutex<()>,
}

impl Logger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level (defaults to "INFO").
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => std::env::temp_dir().join("ark-logs").join(format!(
                "run_{}_{}.md",
                Utc::now().timestamp_millis(),
                std::process::id()
            )),
        };

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let log_level = log_level.unwrap_or("INFO").to_string();
        let level = log_level.parse::<Level>().unwrap_or_else(|_| {
            warn!("Unknown log level '{}', using INFO", log_level);
            Level::INFO
        });

        let logger = Self {
            log_file,
            log_level,
            level,
            write_lock: Mutex::new(()),
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    /// Initialize the log file with header.
    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();

        writeln!(file, "# Agent Interaction Log\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    /// Whether entries at `level` are written.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    /// Append content to log file.
    fn append_to_log(&self, content: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    /// Log the start of a run.
    ///
    /// # Arguments
    /// * `request_id` - Request the run belongs to.
    /// * `agent_type` - Agent type handling the run.
    /// * `query` - User query.
    pub fn log_run_start(&self, request_id: &str, agent_type: &str, query: &str) -> Result<()> {
        if !self.enabled(Level::INFO) {
            return Ok(());
        }
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Run Started - {}\n\n**Request:** {}\n**Agent Type:** {}\n**Query:** {}\n\n",
            now.to_rfc3339(),
            request_id,
            agent_type,
            query
        );

        self.append_to_log(&content)?;
        info!(request_id, agent_type, "Run started");
        Ok(())
    }

    /// Log the start of one agent step.
    ///
    /// # Arguments
    /// * `agent` - Agent name.
    /// * `step` - Step number, starting at 1.
    /// * `max_steps` - Step budget of the agent.
    pub fn log_step(&self, agent: &str, step: usize, max_steps: usize) -> Result<()> {
        if !self.enabled(Level::DEBUG) {
            return Ok(());
        }
        let content = format!("## {} step {}/{}\n\n", agent, step, max_steps);
        self.append_to_log(&content)?;
        debug!(agent, step, max_steps, "Executing step");
        Ok(())
    }

    /// Log a model response.
    ///
    /// # Arguments
    /// * `response` - Text the model produced.
    /// * `tool_calls` - Names of the tools the model asked for.
    /// * `model` - Model name used.
    pub fn log_llm_response(
        &self,
        response: &str,
        tool_calls: &[String],
        model: Option<&str>,
    ) -> Result<()> {
        if !self.enabled(Level::DEBUG) {
            return Ok(());
        }
        // Skip only when the model produced nothing at all
        if response.trim().is_empty() && tool_calls.is_empty() {
            debug!("Skipping log entry for empty LLM response");
            return Ok(());
        }

        let model = model.unwrap_or("unknown");
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!(
            "### LLM Response - {}\n\n**Model:** {}\n\n",
            now.to_rfc3339(),
            model
        );
        if !response.trim().is_empty() {
            content.push_str(&format!("**Response:**\n```\n{}\n```\n\n", response));
        }
        if !tool_calls.is_empty() {
            content.push_str(&format!("**Tool Calls:** {}\n\n", tool_calls.join(", ")));
        }

        self.append_to_log(&content)?;
        debug!(model, tool_calls = tool_calls.len(), "LLM response logged");
        Ok(())
    }

    /// Log tool execution with detailed results.
    ///
    /// # Arguments
    /// * `tool_name` - Name of the tool executed.
    /// * `tool_args` - Arguments passed to the tool.
    /// * `result` - Tool execution result.
    /// * `success` - Whether the tool execution was successful.
    pub fn log_tool_execution(
        &self,
        tool_name: &str,
        tool_args: &str,
        result: &str,
        success: bool,
    ) -> Result<()> {
        if !self.enabled(Level::INFO) {
            return Ok(());
        }
        let now: DateTime<Utc> = Utc::now();
        let status = if success { "Result" } else { "Error" };

        let content = format!(
            "### Tool Execution - {}\n\n**Tool:** {}\n**Args:** {}\n**{}:** {}\n\n",
            now.to_rfc3339(),
            tool_name,
            tool_args,
            status,
            result
        );

        self.append_to_log(&content)?;
        Ok(())
    }

    /// Log the current state of a plan.
    ///
    /// # Arguments
    /// * `plan` - Rendered plan.
    pub fn log_plan(&self, plan: &str) -> Result<()> {
        if !self.enabled(Level::INFO) {
            return Ok(());
        }
        let now: DateTime<Utc> = Utc::now();
        let content = format!("### Plan - {}\n\n```\n{}\n```\n\n", now.to_rfc3339(), plan);
        self.append_to_log(&content)?;
        Ok(())
    }

    /// Log error with context.
    ///
    /// # Arguments
    /// * `error` - Error message.
    /// * `context` - Additional context information.
    pub fn log_error(&self, error: &str, context: Option<&serde_json::Value>) -> Result<()> {
        if !self.enabled(Level::ERROR) {
            return Ok(());
        }
        let now: DateTime<Utc> = Utc::now();
        let mut content = format!("### Error - {}\n\n**Error:** {}\n\n", now.to_rfc3339(), error);

        if let Some(ctx) = context {
            content.push_str(&format!(
                "**Context:** {}\n\n",
                serde_json::to_string_pretty(ctx).unwrap_or_default()
            ));
        }

        self.append_to_log(&content)?;
        error!("{}", error);
        Ok(())
    }

    /// Log run completion.
    ///
    /// # Arguments
    /// * `reason` - Reason for completion.
    pub fn log_completion(&self, reason: &str) -> Result<()> {
        if !self.enabled(Level::INFO) {
            return Ok(());
        }
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Run Completed - {}\n\n**Reason:** {}\n\n---\n\n",
            now.to_rfc3339(),
            reason
        );

        self.append_to_log(&content)?;
        info!("Run completed: {}", reason);
        Ok(())
    }

    /// Get the log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}
