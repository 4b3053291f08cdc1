// In-memory tool servers and models for unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use gemini_core::{
    CallToolResult, ChunkStream, ContentItem, GeminiError, GeminiResult, GenerateContentRequest,
    GenerateContentResponse, JsonRpcError, ModelProvider, Request, Response, RpcTool, StreamChunk,
};
use serde_json::{json, Value};

use crate::host::{ServerSession, Transport};
use crate::rpc::{ListToolsParams, Notification, METHOD_CALL_TOOL, METHOD_INITIALIZE, METHOD_LIST_TOOLS};

type Handler = Arc<dyn Fn(&Value) -> Result<CallToolResult, JsonRpcError> + Send + Sync>;

pub(crate) type ShutdownLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct MockState {
    notifications: Mutex<Vec<String>>,
    shutdowns: AtomicUsize,
    fail_list: AtomicBool,
    crashed: AtomicBool,
}

/// Scripted MCP tool server speaking through the `Transport` trait.
///
/// Clones share state, so a test can keep a handle after giving one to the
/// registry.
#[derive(Clone)]
pub(crate) struct MockToolServer {
    name: String,
    tools: Vec<RpcTool>,
    handlers: BTreeMap<String, Handler>,
    delays: BTreeMap<String, Duration>,
    page_size: Option<usize>,
    fail_initialize: bool,
    fail_shutdown: bool,
    shutdown_log: Option<ShutdownLog>,
    state: Arc<MockState>,
}

fn number_args(args: &Value) -> Result<(Value, Value), String> {
    match (args.get("a"), args.get("b")) {
        (Some(a), Some(b)) if a.is_number() && b.is_number() => Ok((a.clone(), b.clone())),
        _ => Err("arguments 'a' and 'b' must be numbers".to_string()),
    }
}

fn combine(a: &Value, b: &Value, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> String {
    match (a.as_i64(), b.as_i64()) {
        (Some(a), Some(b)) => int_op(a, b).to_string(),
        _ => float_op(a.as_f64().unwrap_or_default(), b.as_f64().unwrap_or_default()).to_string(),
    }
}

fn numbers_schema(description: &str) -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "additionalProperties": false,
        "title": description,
        "properties": {
            "a": {"type": "number", "title": "A"},
            "b": {"type": "number", "title": "B", "default": 0}
        },
        "required": ["a", "b"]
    })
}

impl MockToolServer {
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            tools: Vec::new(),
            handlers: BTreeMap::new(),
            delays: BTreeMap::new(),
            page_size: None,
            fail_initialize: false,
            fail_shutdown: false,
            shutdown_log: None,
            state: Arc::new(MockState::default()),
        }
    }

    /// `add` and `multiply` over two numbers.
    pub fn calculator() -> Self {
        Self::new()
            .named("calculator")
            .with_tool("add", "Add two numbers together.", numbers_schema("addArguments"), |args| {
                let (a, b) = number_args(args)?;
                Ok(format!("{} + {} = {}", a, b, combine(&a, &b, |x, y| x + y, |x, y| x + y)))
            })
            .with_tool(
                "multiply",
                "Multiply two numbers.",
                numbers_schema("multiplyArguments"),
                |args| {
                    let (a, b) = number_args(args)?;
                    Ok(format!("{} * {} = {}", a, b, combine(&a, &b, |x, y| x * y, |x, y| x * y)))
                },
            )
    }

    /// `get_alerts` and `get_forecast` with canned text.
    pub fn weather() -> Self {
        Self::new()
            .named("weather")
            .with_tool(
                "get_alerts",
                "Get weather alerts for a US state.",
                json!({
                    "type": "object",
                    "properties": {"state": {"type": "string", "examples": ["CA"]}},
                    "required": ["state"]
                }),
                |args| Ok(format!("No active alerts for {}.", args["state"].as_str().unwrap_or("?"))),
            )
            .with_tool(
                "get_forecast",
                "Get weather forecast for a location.",
                json!({
                    "type": "object",
                    "properties": {
                        "latitude": {"type": "number", "format": "double"},
                        "longitude": {"type": "number", "format": "double"}
                    }
                }),
                |_| Ok("Sunny, 21C".to_string()),
            )
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_tool<F>(self, name: &str, description: &str, schema: Value, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
    {
        let tool_name = name.to_string();
        let mut server = self.with_raw_tool(name, move |args| match handler(args) {
            Ok(text) => Ok(CallToolResult {
                content: vec![ContentItem::text(text)],
                is_error: false,
            }),
            Err(message) => Err(JsonRpcError {
                code: -32000,
                message: format!("{} failed: {}", tool_name, message),
                data: None,
            }),
        });
        if let Some(tool) = server.tools.last_mut() {
            tool.description = Some(description.to_string());
            tool.input_schema = Some(schema);
        }
        server
    }

    pub fn with_raw_tool<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&Value) -> Result<CallToolResult, JsonRpcError> + Send + Sync + 'static,
    {
        self.tools.push(RpcTool {
            name: name.to_string(),
            description: None,
            input_schema: None,
        });
        self.handlers.insert(name.to_string(), Arc::new(handler));
        self
    }

    pub fn with_call_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.insert(tool.to_string(), delay);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn fail_initialize(mut self) -> Self {
        self.fail_initialize = true;
        self
    }

    pub fn fail_shutdown(mut self) -> Self {
        self.fail_shutdown = true;
        self
    }

    pub fn shutdown_log() -> ShutdownLog {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub fn logging_shutdown_to(mut self, log: ShutdownLog) -> Self {
        self.shutdown_log = Some(log);
        self
    }

    /// Makes `tools/list` fail from now on (or succeed again).
    pub fn fail_list(&self, fail: bool) {
        self.state.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Simulates the server process dying: the transport reports itself closed.
    pub fn crash(&self) {
        self.state.crashed.store(true, Ordering::SeqCst);
    }

    pub fn notifications(&self) -> Vec<String> {
        self.state.notifications.lock().unwrap().clone()
    }

    pub fn shutdown_count(&self) -> usize {
        self.state.shutdowns.load(Ordering::SeqCst)
    }

    fn list_page(&self, params: Option<&Value>) -> Result<Value, JsonRpcError> {
        if self.state.fail_list.load(Ordering::SeqCst) {
            return Err(JsonRpcError::internal("listing unavailable"));
        }
        let params: ListToolsParams = params
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| JsonRpcError::internal(e.to_string()))?
            .unwrap_or_default();

        let start: usize = params
            .cursor
            .as_deref()
            .map(|c| c.parse().unwrap_or(0))
            .unwrap_or(0);
        let size = self.page_size.unwrap_or(self.tools.len().max(1));
        let end = (start + size).min(self.tools.len());
        let mut result = json!({"tools": &self.tools[start..end]});
        if end < self.tools.len() {
            result["nextCursor"] = json!(end.to_string());
        }
        Ok(result)
    }

    async fn call(&self, params: Option<&Value>) -> Result<Value, JsonRpcError> {
        let params = params.cloned().unwrap_or_default();
        let name = params["name"].as_str().unwrap_or_default().to_string();
        let handler = self
            .handlers
            .get(&name)
            .ok_or_else(|| JsonRpcError::internal(format!("Unknown tool: {}", name)))?
            .clone();
        if let Some(delay) = self.delays.get(&name) {
            tokio::time::sleep(*delay).await;
        }
        let result = handler(&params["arguments"])?;
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal(e.to_string()))
    }
}

#[async_trait]
impl Transport for MockToolServer {
    async fn send_request(&self, request: Request) -> Result<Response, JsonRpcError> {
        let id = request.id.clone().unwrap_or(Value::Null);
        let result = match request.method.as_str() {
            METHOD_INITIALIZE if self.fail_initialize => Err(JsonRpcError::internal("boot failure")),
            METHOD_INITIALIZE => Ok(json!({
                "protocolVersion": crate::rpc::PROTOCOL_VERSION,
                "capabilities": {"tools": {}},
                "serverInfo": {"name": self.name, "version": "1.0.0"}
            })),
            METHOD_LIST_TOOLS => self.list_page(request.params.as_ref()),
            METHOD_CALL_TOOL => self.call(request.params.as_ref()).await,
            other => Err(JsonRpcError {
                code: -32601,
                message: format!("Method not found: {}", other),
                data: None,
            }),
        };
        Ok(match result {
            Ok(value) => Response::success(id, value),
            Err(error) => Response::failure(id, error),
        })
    }

    async fn send_notification(&self, notification: Notification) -> Result<(), String> {
        self.state
            .notifications
            .lock()
            .unwrap()
            .push(notification.method);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), String> {
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.shutdown_log {
            log.lock().unwrap().push(self.name.clone());
        }
        if self.fail_shutdown {
            Err("process did not exit".to_string())
        } else {
            Ok(())
        }
    }

    fn is_closed(&self) -> bool {
        self.state.crashed.load(Ordering::SeqCst)
    }
}

/// An initialized session over `server`.
pub(crate) async fn live_session(server_id: &str, server: MockToolServer) -> Arc<ServerSession> {
    let session = Arc::new(ServerSession::new(server_id, Arc::new(server)));
    session.initialize().await.unwrap();
    session
}

/// Model provider replaying queued responses and recording every request.
#[derive(Default)]
pub(crate) struct ScriptedModel {
    responses: Mutex<VecDeque<GeminiResult<GenerateContentResponse>>>,
    streams: Mutex<VecDeque<Vec<StreamChunk>>>,
    requests: Mutex<Vec<GenerateContentRequest>>,
    before_reply: Mutex<Option<BoxFuture<'static, ()>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, response: GenerateContentResponse) -> Self {
        self.responses.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn fail(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(GeminiError::ApiError(message.to_string())));
        self
    }

    pub fn stream(self, chunks: Vec<StreamChunk>) -> Self {
        self.streams.lock().unwrap().push_back(chunks);
        self
    }

    /// Runs `action` once, during the next `generate`, before the reply is returned.
    pub fn before_next_reply<F>(self, action: F) -> Self
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        *self.before_reply.lock().unwrap() = Some(Box::pin(action));
        self
    }

    pub fn requests(&self) -> Vec<GenerateContentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProvider for ScriptedModel {
    async fn generate(
        &self,
        _model: &str,
        request: GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        self.requests.lock().unwrap().push(request);
        let action = self.before_reply.lock().unwrap().take();
        if let Some(action) = action {
            action.await;
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(GenerateContentResponse::default()))
    }

    async fn generate_stream(
        &self,
        _model: &str,
        request: GenerateContentRequest,
    ) -> GeminiResult<ChunkStream> {
        self.requests.lock().unwrap().push(request);
        let chunks = self.streams.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
    }
}
