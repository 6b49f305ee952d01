//! Tool Registry Module
//!
//! Maps tool names to in-process [`LocalTool`]s or [`RemoteToolRef`]s and
//! dispatches model-proposed tool calls.
//!
//! - Names resolve local-first, then remote. Unknown names are reported as
//!   error strings, never as panics.
//! - [`ToolRegistry::execute_many`] fans calls out onto the tokio runtime and
//!   waits for all of them; one failing call never cancels its siblings.
//! - Remote calls go through a [`RemoteToolProxy`]. With the `remote`
//!   feature, [`HttpRemoteToolProxy`] posts envelopes to a tool-execution
//!   client service.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ark::registry::{ToolRegistry, RemoteToolRef};
//! use std::sync::Arc;
//!
//! let registry = ToolRegistry::new();
//! registry.register_local(Arc::new(SearchTool))?;
//! registry.register_remote(RemoteToolRef::new("weather", "Forecast", schema, "http://mcp:8000/sse"))?;
//!
//! // Offer tools to the model
//! let schemas = registry.schemas();
//!
//! // Dispatch the calls it proposed
//! let results = registry.execute_many(&tool_calls).await;
//! ```

mod error;
mod registry;
mod remote;
mod source;
mod tool;

pub use error::{RegistryError, RegistryResult};
pub use registry::{ResolvedTool, ToolRegistry};
pub use remote::{RemoteCallEnvelope, RemoteToolProxy, RemoteToolRef};
pub use source::ToolSource;
pub use tool::{LocalTool, ToolSchema};

#[cfg(feature = "remote")]
pub use remote::HttpRemoteToolProxy;
