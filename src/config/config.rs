//! TOML configuration parsing and management.

use anyhow::Result;
#[cfg(feature = "config")]
use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
#[cfg(feature = "config")]
use std::fs;
use std::path::{Path, PathBuf};

use crate::llm::FunctionCallType;
use crate::sequencer::DEFAULT_STREAM_MESSAGE_TYPES;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub react: ReactConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub sequencer: SequencerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub version: String,
    /// Numeric agent type used when the caller does not pick one.
    pub default_agent_type: u8,
}

fn default_agent_type() -> u8 {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "ark".to_string(),
            version: "0.1.0".to_string(),
            default_agent_type: default_agent_type(),
        }
    }
}

/// Single-agent ReAct configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactConfig {
    pub max_steps: usize,
    /// Maximum characters of a tool result kept as an observation.
    pub max_observe: Option<usize>,
    pub system_prompt: Option<String>,
    pub next_step_prompt: Option<String>,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self {
            max_steps: 40,
            max_observe: Some(10000),
            system_prompt: None,
            next_step_prompt: None,
        }
    }
}

/// Planner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_steps: usize,
    /// Static plan: once a plan exists, advance it without asking the model.
    pub close_update: bool,
    /// Prefix added to the first planning request of a run.
    pub plan_pre_prompt: String,
    pub max_observe: Option<usize>,
    pub system_prompt: Option<String>,
    pub next_step_prompt: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_steps: 40,
            close_update: false,
            plan_pre_prompt: String::new(),
            max_observe: Some(10000),
            system_prompt: None,
            next_step_prompt: None,
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_steps: usize,
    pub max_observe: Option<usize>,
    /// Prefix the Plan-Execute handler puts in front of every sub-task.
    pub task_prefix: String,
    pub system_prompt: Option<String>,
    pub next_step_prompt: Option<String>,
}

fn default_task_prefix() -> String {
    "Your task is: ".to_string()
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_steps: 40,
            max_observe: Some(10000),
            task_prefix: default_task_prefix(),
            system_prompt: None,
            next_step_prompt: None,
        }
    }
}

/// Summarization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Characters kept from each message in the task history.
    pub message_size_limit: usize,
    pub system_prompt: Option<String>,
    pub failure_summary: String,
}

fn default_failure_summary() -> String {
    "Task execution failed, please contact the administrator.".to_string()
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            message_size_limit: 500,
            system_prompt: None,
            failure_summary: default_failure_summary(),
        }
    }
}

/// Model-call configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub function_call_type: FunctionCallType,
    pub timeout_seconds: u64,
    pub temperature: Option<f32>,
    pub enable_streaming: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            function_call_type: FunctionCallType::FunctionCall,
            timeout_seconds: 300,
            temperature: None,
            enable_streaming: true,
        }
    }
}

/// Tools configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tools whose results are kept in memory but not emitted as events.
    #[serde(default)]
    pub silent_tools: Vec<String>,
}

/// Remote tool server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the tool-call proxy service.
    pub client_url: Option<String>,
    pub timeout_seconds: u64,
    /// Tool servers discovered at startup.
    pub servers: Vec<String>,
}

fn default_remote_timeout() -> u64 {
    30
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            client_url: None,
            timeout_seconds: default_remote_timeout(),
            servers: vec![],
        }
    }
}

/// Event sequencing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Message types that recur within one task and get incrementing orders.
    pub stream_message_types: Vec<String>,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            stream_message_types: DEFAULT_STREAM_MESSAGE_TYPES
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_file: Option<String>,
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: "INFO".to_string(),
        }
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    pub config_path: PathBuf,
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None, uses default config.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        Self::new_with_bases(config_path, None)
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Self {
        let config_path = PathBuf::from("config").join(format!("{}.toml", config.agent.name));
        Self {
            config_path,
            config,
        }
    }

    /// Initialize configuration loader with a custom log base path.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None, uses default config.
    /// * `log_base` - Base directory for run transcripts. If None, uses path from config.
    pub fn new_with_bases(config_path: Option<&Path>, log_base: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/ark.toml"));

        let mut config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Self::get_default_config()
        };

        if let Some(log_base) = log_base {
            let log_dir = log_base.join(&config.agent.name);
            let filename = format!(
                "{}_{}_{}.md",
                config.agent.name,
                Utc::now().timestamp_millis(),
                std::process::id()
            );
            config.logging.log_file = Some(log_dir.join(filename).to_string_lossy().to_string());
        }

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from TOML file.
    #[cfg(feature = "config")]
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    #[cfg(not(feature = "config"))]
    fn load_config(path: &Path) -> Result<Configuration> {
        anyhow::bail!(
            "Cannot load {}: TOML support requires the `config` feature",
            path.display()
        )
    }

    /// Get default configuration.
    fn get_default_config() -> Configuration {
        Configuration::default()
    }

    /// Get configuration value by dot-notation key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        let config = &self.config;
        match key {
            "agent.name" => Some(config.agent.name.clone()),
            "agent.version" => Some(config.agent.version.clone()),
            "planner.plan_pre_prompt" => Some(config.planner.plan_pre_prompt.clone()),
            "executor.task_prefix" => Some(config.executor.task_prefix.clone()),
            "summary.failure_summary" => Some(config.summary.failure_summary.clone()),
            "llm.function_call_type" => Some(config.llm.function_call_type.to_string()),
            "remote.client_url" => config.remote.client_url.clone(),
            "logging.log_file" => config.logging.log_file.clone(),
            "logging.log_level" => Some(config.logging.log_level.clone()),
            _ => None,
        }
    }

    /// Get numeric configuration value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        let config = &self.config;
        match key {
            "agent.default_agent_type" => Some(config.agent.default_agent_type as u64),
            "react.max_steps" => Some(config.react.max_steps as u64),
            "react.max_observe" => config.react.max_observe.map(|v| v as u64),
            "planner.max_steps" => Some(config.planner.max_steps as u64),
            "planner.max_observe" => config.planner.max_observe.map(|v| v as u64),
            "executor.max_steps" => Some(config.executor.max_steps as u64),
            "executor.max_observe" => config.executor.max_observe.map(|v| v as u64),
            "summary.message_size_limit" => Some(config.summary.message_size_limit as u64),
            "llm.timeout_seconds" => Some(config.llm.timeout_seconds),
            "remote.timeout_seconds" => Some(config.remote.timeout_seconds),
            _ => None,
        }
    }

    /// Get boolean configuration value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match key {
            "planner.close_update" => Some(self.config.planner.close_update),
            "llm.enable_streaming" => Some(self.config.llm.enable_streaming),
            _ => None,
        }
    }

    /// Get LLM streaming enablement configuration.
    pub fn get_llm_streaming_enabled(&self) -> bool {
        self.config.llm.enable_streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigurationLoader::get_default_config();
        assert_eq!(config.agent.name, "ark");
        assert_eq!(config.agent.default_agent_type, 5);
        assert_eq!(config.react.max_steps, 40);
        assert!(!config.planner.close_update);
        assert_eq!(config.executor.task_prefix, "Your task is: ");
        assert_eq!(config.remote.timeout_seconds, 30);
        assert_eq!(config.llm.function_call_type, FunctionCallType::FunctionCall);
        assert!(config
            .sequencer
            .stream_message_types
            .contains(&"tool_result".to_string()));
    }

    #[test]
    fn test_get_methods() {
        let loader = ConfigurationLoader::new(Some(Path::new("does/not/exist.toml"))).unwrap();
        assert_eq!(loader.get_string("agent.name"), Some("ark".to_string()));
        assert_eq!(loader.get_string("remote.client_url"), None);
        assert_eq!(loader.get_u64("executor.max_steps"), Some(40));
        assert_eq!(loader.get_u64("summary.message_size_limit"), Some(500));
        assert_eq!(loader.get_bool("planner.close_update"), Some(false));
        assert_eq!(loader.get_u64("unknown.key"), None);
        assert!(loader.get_llm_streaming_enabled());
    }

    #[test]
    fn test_log_base_sets_transcript_path() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ConfigurationLoader::new_with_bases(
            Some(Path::new("does/not/exist.toml")),
            Some(dir.path()),
        )
        .unwrap();
        let log_file = loader.config.logging.log_file.unwrap();
        assert!(log_file.starts_with(dir.path().join("ark").to_string_lossy().as_ref()));
        assert!(log_file.ends_with(".md"));
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_partial_toml_keeps_defaults() {
        use std::fs;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[planner]
max_steps = 12
close_update = true
plan_pre_prompt = "Plan first. "

[llm]
function_call_type = "struct_parse"
timeout_seconds = 60
enable_streaming = false

[tools]
silent_tools = ["planning"]
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();

        let loader = ConfigurationLoader::new(Some(temp_file.path())).unwrap();
        let config = &loader.config;
        assert_eq!(config.planner.max_steps, 12);
        assert!(config.planner.close_update);
        assert_eq!(config.llm.function_call_type, FunctionCallType::StructParse);
        assert_eq!(config.tools.silent_tools, vec!["planning".to_string()]);
        assert_eq!(config.react.max_steps, 40);
        assert_eq!(
            loader.get_string("llm.function_call_type"),
            Some("struct_parse".to_string())
        );
        assert!(!loader.get_llm_streaming_enabled());
    }

    #[cfg(feature = "config")]
    #[test]
    fn test_invalid_toml_is_an_error() {
        use std::fs;
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[react\nmax_steps = ").unwrap();
        let err = ConfigurationLoader::new(Some(temp_file.path())).unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML config"));
    }
}
