//! Thread-safe tool registry with local-first resolution and concurrent dispatch.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures_util::future::join_all;
use tracing::{debug, error, warn};

use crate::memory::{ToolArguments, ToolCall};

use super::{
    LocalTool, RegistryError, RegistryResult, RemoteCallEnvelope, RemoteToolProxy,
    RemoteToolRef, ToolSchema, ToolSource,
};

/// Internal state of the registry.
#[derive(Default)]
pub(crate) struct RegistryInner {
    /// Local tools by name, in registration order.
    pub(crate) local: Vec<Arc<dyn LocalTool>>,
    pub(crate) local_index: HashMap<String, usize>,

    /// Remote tools by name, in registration order.
    pub(crate) remote: Vec<RemoteToolRef>,
    pub(crate) remote_index: HashMap<String, usize>,

    /// Proxy used for remote calls.
    pub(crate) proxy: Option<Arc<dyn RemoteToolProxy>>,
}

/// A tool resolved by name, ready to execute.
#[derive(Clone)]
pub enum ResolvedTool {
    /// In-process tool.
    Local(Arc<dyn LocalTool>),
    /// Tool behind a remote server.
    Remote(RemoteToolRef),
}

impl ResolvedTool {
    /// Where the tool executes.
    pub fn source(&self) -> ToolSource {
        match self {
            ResolvedTool::Local(_) => ToolSource::Local,
            ResolvedTool::Remote(_) => ToolSource::Remote,
        }
    }
}

impl std::fmt::Debug for ResolvedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedTool::Local(tool) => f.debug_tuple("Local").field(&tool.name()).finish(),
            ResolvedTool::Remote(tool) => f.debug_tuple("Remote").field(tool).finish(),
        }
    }
}

/// Thread-safe registry mapping tool names to local tools or remote references.
///
/// Names resolve local-first, remote second. Registering a name that is
/// already present replaces the earlier entry of the same kind.
///
/// # Thread Safety
///
/// The registry is wrapped in `Arc<RwLock<...>>` internally, making it safe
/// to clone into spawned tasks. Locks are never held across an `.await`.
///
/// # Example
///
/// ```rust,ignore
/// use ark::registry::ToolRegistry;
///
/// let registry = ToolRegistry::new();
/// registry.register_local(Arc::new(SearchTool))?;
///
/// let results = registry.execute_many(&calls).await;
/// ```
#[derive(Clone, Default)]
pub struct ToolRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.read();
        f.debug_struct("ToolRegistry")
            .field("local", &inner.local_index.keys().collect::<Vec<_>>())
            .field("remote", &inner.remote_index.keys().collect::<Vec<_>>())
            .field("has_proxy", &inner.proxy.is_some())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tool names only need to be non-empty.
    pub(crate) fn validate_name(name: &str) -> RegistryResult<()> {
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    /// Set the proxy used to reach remote tools.
    pub fn with_remote_proxy(self, proxy: Arc<dyn RemoteToolProxy>) -> Self {
        self.set_remote_proxy(proxy);
        self
    }

    /// Replace the proxy used to reach remote tools.
    pub fn set_remote_proxy(&self, proxy: Arc<dyn RemoteToolProxy>) {
        self.write().proxy = Some(proxy);
    }

    /// Register a local tool, replacing any local tool of the same name.
    pub fn register_local(&self, tool: Arc<dyn LocalTool>) -> RegistryResult<()> {
        let name = tool.name().to_string();
        Self::validate_name(&name)?;

        let mut inner = self.write();
        match inner.local_index.get(&name).copied() {
            Some(idx) => {
                debug!(tool = %name, "replacing local tool");
                inner.local[idx] = tool;
            }
            None => {
                let idx = inner.local.len();
                inner.local_index.insert(name, idx);
                inner.local.push(tool);
            }
        }
        Ok(())
    }

    /// Register a remote tool, replacing any remote tool of the same name.
    pub fn register_remote(&self, tool: RemoteToolRef) -> RegistryResult<()> {
        Self::validate_name(&tool.name)?;

        let mut inner = self.write();
        match inner.remote_index.get(&tool.name).copied() {
            Some(idx) => {
                debug!(tool = %tool.name, "replacing remote tool");
                inner.remote[idx] = tool;
            }
            None => {
                let idx = inner.remote.len();
                inner.remote_index.insert(tool.name.clone(), idx);
                inner.remote.push(tool);
            }
        }
        Ok(())
    }

    /// Discover and register every tool exposed by a remote server.
    ///
    /// Returns the number of tools registered.
    pub async fn discover_remote(&self, server_url: &str) -> RegistryResult<usize> {
        let proxy = self
            .read()
            .proxy
            .clone()
            .ok_or_else(|| RegistryError::RemoteUnavailable(server_url.to_string()))?;

        let tools = proxy
            .list_tools(server_url)
            .await
            .map_err(|e| RegistryError::RemoteCallFailed {
                name: "tool/list".to_string(),
                server: server_url.to_string(),
                reason: format!("{:#}", e),
            })?;

        let mut count = 0;
        for tool in tools {
            match self.register_remote(tool) {
                Ok(()) => count += 1,
                Err(e) => warn!(server = %server_url, "skipping remote tool: {}", e),
            }
        }
        Ok(count)
    }

    /// Resolve a name to a local tool first, then a remote one.
    pub fn resolve(&self, name: &str) -> RegistryResult<ResolvedTool> {
        let inner = self.read();
        if let Some(&idx) = inner.local_index.get(name) {
            return Ok(ResolvedTool::Local(Arc::clone(&inner.local[idx])));
        }
        if let Some(&idx) = inner.remote_index.get(name) {
            return Ok(ResolvedTool::Remote(inner.remote[idx].clone()));
        }
        Err(RegistryError::NotFound(name.to_string()))
    }

    /// Check if a tool with the given name resolves.
    pub fn contains(&self, name: &str) -> bool {
        let inner = self.read();
        inner.local_index.contains_key(name) || inner.remote_index.contains_key(name)
    }

    /// Tool schemas offered to the model.
    ///
    /// Local tools come first; a remote tool shadowed by a local one of the
    /// same name is omitted.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let inner = self.read();
        let mut schemas: Vec<ToolSchema> = inner
            .local
            .iter()
            .map(|tool| ToolSchema::from_local(tool.as_ref()))
            .collect();
        schemas.extend(
            inner
                .remote
                .iter()
                .filter(|tool| !inner.local_index.contains_key(&tool.name))
                .map(RemoteToolRef::to_schema),
        );
        schemas
    }

    /// List all tool names, local first.
    pub fn tool_names(&self) -> Vec<String> {
        self.schemas().into_iter().map(|s| s.name).collect()
    }

    /// Get the total number of distinct tool names.
    pub fn len(&self) -> usize {
        self.schemas().len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        let inner = self.read();
        inner.local.is_empty() && inner.remote.is_empty()
    }

    /// Copy of this registry with its own tool table.
    ///
    /// Tools themselves are shared; registrations on the copy do not
    /// affect the original.
    pub fn snapshot(&self) -> Self {
        let inner = self.read();
        let copy = RegistryInner {
            local: inner.local.clone(),
            local_index: inner.local_index.clone(),
            remote: inner.remote.clone(),
            remote_index: inner.remote_index.clone(),
            proxy: inner.proxy.clone(),
        };
        Self {
            inner: Arc::new(RwLock::new(copy)),
        }
    }

    /// Execute a named tool.
    pub async fn execute(&self, name: &str, args: ToolArguments) -> RegistryResult<String> {
        match self.resolve(name)? {
            ResolvedTool::Local(tool) => {
                tool.execute(args)
                    .await
                    .map_err(|e| RegistryError::ExecutionFailed {
                        name: name.to_string(),
                        reason: format!("{:#}", e),
                    })
            }
            ResolvedTool::Remote(tool) => {
                let proxy = self
                    .read()
                    .proxy
                    .clone()
                    .ok_or_else(|| RegistryError::RemoteUnavailable(name.to_string()))?;

                let envelope = RemoteCallEnvelope {
                    server_url: tool.server_url.clone(),
                    name: tool.name.clone(),
                    arguments: args.into_value(),
                };
                proxy
                    .call(&envelope)
                    .await
                    .map_err(|e| RegistryError::RemoteCallFailed {
                        name: name.to_string(),
                        server: tool.server_url,
                        reason: format!("{:#}", e),
                    })
            }
        }
    }

    /// Execute one tool call, normalizing every failure to an observation string.
    pub async fn execute_one(&self, call: &ToolCall) -> String {
        let args = match call.parsed_arguments() {
            Ok(args) => args,
            Err(e) => {
                let err = RegistryError::InvalidArguments {
                    name: call.name.clone(),
                    reason: e.to_string(),
                };
                warn!(tool = %call.name, call_id = %call.id, "{}", err);
                return err.to_observation();
            }
        };

        match self.execute(&call.name, args).await {
            Ok(result) => {
                debug!(tool = %call.name, call_id = %call.id, "tool executed");
                result
            }
            Err(err) => {
                error!(tool = %call.name, call_id = %call.id, "{}", err);
                err.to_observation()
            }
        }
    }

    /// Execute all calls concurrently and wait for every one of them.
    ///
    /// The returned map holds one entry per call id. A failing call yields
    /// an error string and never cancels its siblings.
    pub async fn execute_many(&self, calls: &[ToolCall]) -> HashMap<String, String> {
        let handles: Vec<_> = calls
            .iter()
            .cloned()
            .map(|call| {
                let registry = self.clone();
                tokio::spawn(async move { registry.execute_one(&call).await })
            })
            .collect();

        let outcomes = join_all(handles).await;

        calls
            .iter()
            .zip(outcomes)
            .map(|(call, outcome)| {
                let result = outcome.unwrap_or_else(|e| {
                    error!(tool = %call.name, call_id = %call.id, "tool task aborted: {}", e);
                    RegistryError::ExecutionFailed {
                        name: call.name.clone(),
                        reason: format!("task aborted: {}", e),
                    }
                    .to_observation()
                });
                (call.id.clone(), result)
            })
            .collect()
    }
}
