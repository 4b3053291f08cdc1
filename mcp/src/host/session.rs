use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use gemini_core::{CallToolResult, Request, RpcTool};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::transport::Transport;
use crate::error::McpError;
use crate::rpc::{
    CallToolParams, InitializeParams, InitializeResult, ListToolsParams, ListToolsResult,
    Notification, METHOD_CALL_TOOL, METHOD_INITIALIZE, METHOD_INITIALIZED, METHOD_LIST_TOOLS,
};

/// A live MCP client session with one tool server.
///
/// Requests on a session are serialized: a second caller waits until the
/// first response (or timeout) has been handled.
pub struct ServerSession {
    server_id: String,
    transport: Arc<dyn Transport>,
    next_request_id: AtomicU64,
    call_lock: Mutex<()>,
    initialized: AtomicBool,
    closed: AtomicBool,
}

impl fmt::Debug for ServerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerSession")
            .field("server_id", &self.server_id)
            .field("initialized", &self.initialized.load(Ordering::SeqCst))
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl ServerSession {
    pub fn new(server_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            server_id: server_id.into(),
            transport,
            next_request_id: AtomicU64::new(1),
            call_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    /// True once the handshake completed, until the session is closed or the
    /// server behind it goes away.
    pub fn is_live(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
            && !self.closed.load(Ordering::SeqCst)
            && !self.transport.is_closed()
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, McpError> {
        let _serial = self.call_lock.lock().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::NotConnected(self.server_id.clone()));
        }

        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let request = Request::new(Some(json!(id)), method.to_string(), Some(params));
        debug!("Session({}): '{}' id {}", self.server_id, method, id);

        let rpc_error = |error| McpError::Rpc {
            server_id: self.server_id.clone(),
            error,
        };
        let response = self.transport.send_request(request).await.map_err(rpc_error)?;
        let result = response.result().map_err(rpc_error)?;
        Ok(serde_json::from_value(result)?)
    }

    /// Performs the MCP handshake: `initialize`, then the `initialized`
    /// notification.
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = serde_json::to_value(InitializeParams::default())?;
        let result: InitializeResult = self.request(METHOD_INITIALIZE, params).await?;

        self.transport
            .send_notification(Notification::new(METHOD_INITIALIZED.to_string(), None))
            .await
            .map_err(|message| McpError::Transport {
                server_id: self.server_id.clone(),
                message,
            })?;

        self.initialized.store(true, Ordering::SeqCst);
        info!(
            "Session({}): initialized (server {:?}, protocol {:?})",
            self.server_id,
            result.server_info.as_ref().map(|info| info.name.as_str()),
            result.protocol_version
        );
        Ok(result)
    }

    /// All tools the server advertises, following pagination cursors.
    pub async fn list_tools(&self) -> Result<Vec<RpcTool>, McpError> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let params = serde_json::to_value(ListToolsParams { cursor })?;
            let page: ListToolsResult = self.request(METHOD_LIST_TOOLS, params).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        Ok(tools)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        let params = serde_json::to_value(CallToolParams {
            name: name.to_string(),
            arguments,
        })?;
        self.request(METHOD_CALL_TOOL, params).await
    }

    /// Marks the session closed and releases the transport. Idempotent.
    pub(crate) async fn close(&self) -> Result<(), McpError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.transport
            .shutdown()
            .await
            .map_err(|message| McpError::Transport {
                server_id: self.server_id.clone(),
                message,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockToolServer;

    #[tokio::test]
    async fn test_handshake_then_list_and_call() {
        let server = MockToolServer::calculator();
        let session = ServerSession::new("calc", Arc::new(server.clone()));
        assert!(!session.is_live());

        session.initialize().await.unwrap();
        assert!(session.is_live());
        assert_eq!(server.notifications(), vec![METHOD_INITIALIZED.to_string()]);

        let tools = session.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["add", "multiply"]);

        let result = session.call_tool("add", json!({"a": 40, "b": 2})).await.unwrap();
        assert_eq!(result.content[0].text.as_deref(), Some("40 + 2 = 42"));
    }

    #[tokio::test]
    async fn test_list_tools_follows_cursor() {
        let server = MockToolServer::calculator().with_page_size(1);
        let session = ServerSession::new("calc", Arc::new(server));
        session.initialize().await.unwrap();
        assert_eq!(session.list_tools().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_requests() {
        let server = MockToolServer::calculator();
        let session = ServerSession::new("calc", Arc::new(server.clone()));
        session.initialize().await.unwrap();
        session.close().await.unwrap();
        session.close().await.unwrap();

        assert!(!session.is_live());
        assert_eq!(server.shutdown_count(), 1);
        assert!(matches!(
            session.list_tools().await,
            Err(McpError::NotConnected(id)) if id == "calc"
        ));
    }
}
