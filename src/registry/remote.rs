//! Remote tool references and the proxy used to call them.
//!
//! A remote tool lives behind a tool server address. The registry never
//! talks to that server directly; it hands a [`RemoteCallEnvelope`] to a
//! [`RemoteToolProxy`], which forwards it to a tool-execution client
//! service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ToolSchema, ToolSource};

/// Declaration of a tool hosted on a remote tool server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteToolRef {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON schema of the arguments.
    pub schema: Value,
    /// Address of the server hosting the tool.
    pub server_url: String,
}

impl RemoteToolRef {
    /// Create a new remote tool reference.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        server_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            server_url: server_url.into(),
        }
    }

    /// Schema offered to the model for this tool.
    pub fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.schema.clone(),
            source: ToolSource::Remote,
        }
    }
}

/// Request body for a remote tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCallEnvelope {
    /// Address of the server hosting the tool.
    pub server_url: String,
    /// Tool name.
    pub name: String,
    /// Tool arguments, passed through untouched.
    pub arguments: Value,
}

/// Transport used by the registry to reach remote tools.
#[async_trait]
pub trait RemoteToolProxy: Send + Sync {
    /// Invoke a remote tool and return its textual result.
    async fn call(&self, envelope: &RemoteCallEnvelope) -> anyhow::Result<String>;

    /// Discover the tools a remote server exposes.
    async fn list_tools(&self, server_url: &str) -> anyhow::Result<Vec<RemoteToolRef>>;
}

#[cfg(feature = "remote")]
pub use self::http::HttpRemoteToolProxy;

#[cfg(feature = "remote")]
mod http {
    use std::time::Duration;

    use anyhow::{anyhow, Context};
    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    use super::{RemoteCallEnvelope, RemoteToolProxy, RemoteToolRef};

    #[derive(Debug, Serialize)]
    struct ListRequest<'a> {
        server_url: &'a str,
    }

    /// Envelope returned by the tool-execution client service.
    #[derive(Debug, Deserialize)]
    struct ClientResponse {
        #[serde(default)]
        code: Option<Value>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        data: Option<Value>,
    }

    /// Tool entry as returned by `/v1/tool/list`.
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct ListedTool {
        name: String,
        #[serde(default)]
        description: String,
        #[serde(default, alias = "input_schema")]
        input_schema: Value,
    }

    /// HTTP proxy posting envelopes to a tool-execution client service.
    ///
    /// Calls go to `<client_url>/v1/tool/call`, discovery to
    /// `<client_url>/v1/tool/list`.
    #[derive(Debug, Clone)]
    pub struct HttpRemoteToolProxy {
        client_url: String,
        http_client: reqwest::Client,
        timeout: Duration,
    }

    impl HttpRemoteToolProxy {
        /// Create a proxy for the client service at `client_url`.
        pub fn new(client_url: impl Into<String>, timeout_seconds: u64) -> Self {
            Self {
                client_url: client_url.into().trim_end_matches('/').to_string(),
                http_client: reqwest::Client::new(),
                timeout: Duration::from_secs(timeout_seconds),
            }
        }

        /// Base URL of the client service.
        pub fn client_url(&self) -> &str {
            &self.client_url
        }

        async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> anyhow::Result<String> {
            let url = format!("{}{}", self.client_url, path);
            let response = self
                .http_client
                .post(&url)
                .timeout(self.timeout)
                .json(body)
                .send()
                .await
                .with_context(|| format!("HTTP request to {} failed", url))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read response body from {}", url))?;

            if !status.is_success() {
                return Err(anyhow!("HTTP {} from {}: {}", status, url, text));
            }
            Ok(text)
        }
    }

    #[async_trait]
    impl RemoteToolProxy for HttpRemoteToolProxy {
        async fn call(&self, envelope: &RemoteCallEnvelope) -> anyhow::Result<String> {
            tracing::debug!(tool = %envelope.name, server = %envelope.server_url, "calling remote tool");
            self.post("/v1/tool/call", envelope).await
        }

        async fn list_tools(&self, server_url: &str) -> anyhow::Result<Vec<RemoteToolRef>> {
            let body = self.post("/v1/tool/list", &ListRequest { server_url }).await?;
            parse_tool_list(&body, server_url)
        }
    }

    /// Parse a `/v1/tool/list` response.
    ///
    /// `data` may hold the tool array directly or as an embedded JSON string.
    pub(super) fn parse_tool_list(body: &str, server_url: &str) -> anyhow::Result<Vec<RemoteToolRef>> {
        let response: ClientResponse =
            serde_json::from_str(body).context("Failed to parse tool list response")?;

        let data = match response.data {
            Some(Value::String(raw)) => {
                serde_json::from_str(&raw).context("Failed to parse embedded tool list")?
            }
            Some(value) => value,
            None => {
                return Err(anyhow!(
                    "Tool list response has no data (code: {:?}, message: {:?})",
                    response.code,
                    response.message
                ))
            }
        };

        let listed: Vec<ListedTool> =
            serde_json::from_value(data).context("Unexpected tool list shape")?;

        Ok(listed
            .into_iter()
            .map(|t| RemoteToolRef::new(t.name, t.description, t.input_schema, server_url))
            .collect())
    }
}
