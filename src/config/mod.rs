//! Configuration for agent runs.
//!
//! Every agent and handler takes its settings as plain structs passed to
//! its constructor. With the `config` feature they can be loaded from a
//! TOML file, and host-level overrides read from the environment.
//!
//! # Example
//!
//! ```no_run
//! use ark::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! let env = EnvironmentLoader::new(None);
//! let mut config = ConfigurationLoader::new(Some(Path::new("config/ark.toml"))).unwrap().config;
//! env.apply_overrides(&mut config);
//!
//! println!("Planner budget: {}", config.planner.max_steps);
//! println!("Remote proxy: {:?}", config.remote.client_url);
//! ```

#[allow(clippy::module_inception)]
pub mod config;
#[cfg(feature = "config")]
pub mod environment;

pub use self::config::{
    AgentConfig, Configuration, ConfigurationLoader, ExecutorConfig, LlmConfig, LoggingConfig,
    PlannerConfig, ReactConfig, RemoteConfig, SequencerConfig, SummaryConfig, ToolsConfig,
};
#[cfg(feature = "config")]
pub use self::environment::EnvironmentLoader;
