use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gemini_core::{CallToolResult, FunctionCall};
use log::{debug, warn};
use serde_json::Value;

use crate::catalog::{Catalog, ToolCatalog};

/// Outcome of one tool invocation. Every variant renders to the text handed
/// back to the model or the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    /// Text of the first content item returned by the tool.
    Text(String),
    NotFound { tool: String },
    /// The owning server went away between lookup and call.
    NotConnected { tool: String, server_id: String },
    InvocationFailed { tool: String, message: String },
    /// The tool ran but returned no content items.
    Empty,
    TimedOut { tool: String, after: Duration },
}

impl CallResult {
    fn from_tool_result(tool: &str, result: CallToolResult) -> Self {
        let Some(first) = result.content.into_iter().next() else {
            return CallResult::Empty;
        };
        match first.text {
            Some(text) => CallResult::Text(text),
            None => CallResult::InvocationFailed {
                tool: tool.to_string(),
                message: format!("unsupported content type '{}'", first.kind),
            },
        }
    }
}

impl fmt::Display for CallResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallResult::Text(text) => f.write_str(text),
            CallResult::NotFound { tool } => {
                write!(f, "Error: Tool '{}' not found in any connected server", tool)
            }
            CallResult::NotConnected { tool, server_id } => write!(
                f,
                "Error: Server '{}' for tool '{}' is not connected",
                server_id, tool
            ),
            CallResult::InvocationFailed { tool, message } => {
                write!(f, "Error calling tool {}: {}", tool, message)
            }
            CallResult::Empty => f.write_str("Tool executed successfully but returned no content."),
            CallResult::TimedOut { tool, after } => write!(
                f,
                "Error calling tool {}: timed out after {}s",
                tool,
                after.as_secs_f64()
            ),
        }
    }
}

/// Resolves tool names against the catalog and forwards invocations with a
/// per-call timeout.
#[derive(Debug, Clone)]
pub struct CallRouter {
    catalog: Arc<ToolCatalog>,
    timeout: Duration,
}

impl CallRouter {
    pub fn new(catalog: Arc<ToolCatalog>, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Calls `name` against the currently published catalog.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> CallResult {
        let catalog = self.catalog.snapshot();
        self.call_tool_in(&catalog, name, arguments).await
    }

    /// Calls `name` against a specific catalog snapshot.
    pub async fn call_tool_in(&self, catalog: &Catalog, name: &str, arguments: Value) -> CallResult {
        let Some(descriptor) = catalog.get(name) else {
            debug!("Tool '{}' is not in the catalog", name);
            return CallResult::NotFound {
                tool: name.to_string(),
            };
        };

        let not_connected = || CallResult::NotConnected {
            tool: name.to_string(),
            server_id: descriptor.owning_server_id.clone(),
        };
        let Some(session) = catalog.session(&descriptor.owning_server_id) else {
            return not_connected();
        };
        if !session.is_live() {
            return not_connected();
        }

        debug!(
            "Calling tool '{}' on server '{}'",
            name, descriptor.owning_server_id
        );
        match tokio::time::timeout(self.timeout, session.call_tool(name, arguments)).await {
            Ok(Ok(result)) => CallResult::from_tool_result(name, result),
            Ok(Err(e)) if !session.is_live() => {
                debug!("Tool '{}' failed after its server closed: {}", name, e);
                not_connected()
            }
            Ok(Err(e)) => {
                warn!("Tool '{}' failed: {}", name, e);
                CallResult::InvocationFailed {
                    tool: name.to_string(),
                    message: e.to_string(),
                }
            }
            Err(_) => {
                warn!(
                    "Tool '{}' timed out after {:?}",
                    name, self.timeout
                );
                CallResult::TimedOut {
                    tool: name.to_string(),
                    after: self.timeout,
                }
            }
        }
    }

    /// Routes a model-requested function call. Returns the tool name with the
    /// rendered result text.
    pub async fn process_function_call(
        &self,
        catalog: &Catalog,
        call: &FunctionCall,
    ) -> (String, String) {
        let result = self
            .call_tool_in(catalog, &call.name, call.arguments.clone())
            .await;
        (call.name.clone(), result.to_string())
    }
}
