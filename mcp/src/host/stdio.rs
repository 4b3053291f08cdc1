// Newline-delimited JSON-RPC over a child process's stdin/stdout.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use gemini_core::{JsonRpcError, Request, Response};
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task;

use super::transport::Transport;
use crate::error::McpError;
use crate::launch::{LaunchProfile, LaunchSpec};
use crate::rpc::Notification;

// Constants for buffer sizes
const STDIO_BUFFER_SIZE: usize = 8192;
const CHANNEL_BUFFER_SIZE: usize = 32;

type Responder = oneshot::Sender<Result<Response, JsonRpcError>>;
type PendingMap = Arc<StdMutex<HashMap<u64, Responder>>>;

/// Transport to a tool server speaking MCP over stdio.
#[derive(Debug)]
pub struct StdioTransport {
    server_id: String,
    stdin_tx: mpsc::Sender<String>,
    pending: PendingMap,
    // Set once the stdout reader has stopped
    closed: Arc<AtomicBool>,
    process: Mutex<Option<Child>>,
}

// Removes a pending request when its caller stops waiting (timeout, cancellation)
struct PendingGuard<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.id);
    }
}

fn lock(pending: &PendingMap) -> std::sync::MutexGuard<'_, HashMap<u64, Responder>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

impl StdioTransport {
    /// Spawns the server script under its interpreter and wires up the pipes.
    pub async fn launch(
        server_id: &str,
        profile: &LaunchProfile,
        spec: &LaunchSpec,
        env: Option<&HashMap<String, String>>,
    ) -> Result<Self, McpError> {
        info!(
            "Launching MCP server '{}': {} {}",
            server_id,
            profile.interpreter,
            spec.script.display()
        );

        let mut cmd = Command::new(profile.interpreter);
        cmd.arg(&spec.script);
        cmd.args(&spec.args);
        if let Some(env) = env {
            cmd.envs(env);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // The child must not outlive a dropped transport
        cmd.kill_on_drop(true);

        let launch_failed = |message: String| McpError::LaunchFailed {
            server_id: server_id.to_string(),
            message,
        };

        let mut process = cmd
            .spawn()
            .map_err(|e| launch_failed(format!("Failed to spawn: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| launch_failed("Failed to get stdin".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| launch_failed("Failed to get stdout".to_string()))?;
        let stderr = process
            .stderr
            .take()
            .ok_or_else(|| launch_failed("Failed to get stderr".to_string()))?;

        spawn_stderr_logger(server_id.to_string(), stderr);

        let transport = Self::from_io(server_id, stdin, stdout);
        *transport.process.lock().await = Some(process);
        Ok(transport)
    }

    /// Builds a transport over arbitrary pipes.
    pub fn from_io<W, R>(server_id: &str, writer: W, reader: R) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (stdin_tx, stdin_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let pending: PendingMap = Arc::new(StdMutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        spawn_stdin_writer(server_id.to_string(), writer, stdin_rx);
        spawn_stdout_reader(server_id.to_string(), reader, pending.clone(), closed.clone());

        Self {
            server_id: server_id.to_string(),
            stdin_tx,
            pending,
            closed,
            process: Mutex::new(None),
        }
    }

    fn connection_closed_error(&self) -> JsonRpcError {
        JsonRpcError {
            code: -32001,
            message: format!("Connection to server '{}' is closed", self.server_id),
            data: None,
        }
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send_request(&self, request: Request) -> Result<Response, JsonRpcError> {
        let id = request
            .id
            .as_ref()
            .and_then(Value::as_u64)
            .ok_or_else(|| JsonRpcError::internal("Request id must be a non-negative integer"))?;

        if self.closed.load(Ordering::SeqCst) {
            return Err(self.connection_closed_error());
        }

        let request_json = serde_json::to_string(&request).map_err(|e| JsonRpcError {
            code: -32700,
            message: format!("Failed to serialize request: {}", e),
            data: None,
        })?;

        let (resp_tx, resp_rx) = oneshot::channel();
        lock(&self.pending).insert(id, resp_tx);
        let _guard = PendingGuard {
            pending: &self.pending,
            id,
        };

        // The reader may have drained the map before our insert
        if self.closed.load(Ordering::SeqCst) {
            return Err(self.connection_closed_error());
        }

        debug!(
            "Request({}): sending id {} ('{}')",
            self.server_id, id, request.method
        );
        self.stdin_tx
            .send(request_json)
            .await
            .map_err(|e| JsonRpcError {
                code: -32000,
                message: format!("Failed to send request: {}", e),
                data: None,
            })?;

        resp_rx
            .await
            .map_err(|_| JsonRpcError::internal("Failed to receive response from server"))?
    }

    async fn send_notification(&self, notification: Notification) -> Result<(), String> {
        let notification_json = serde_json::to_string(&notification)
            .map_err(|e| format!("Failed to serialize notification: {}", e))?;
        self.stdin_tx
            .send(notification_json)
            .await
            .map_err(|_| "Failed to send notification to server".to_string())
    }

    async fn shutdown(&self) -> Result<(), String> {
        self.closed.store(true, Ordering::SeqCst);

        let Some(mut process) = self.process.lock().await.take() else {
            return Ok(());
        };

        match process.try_wait() {
            Ok(Some(status)) => {
                info!("MCP server '{}' already exited ({})", self.server_id, status);
                Ok(())
            }
            _ => match process.kill().await {
                Ok(()) => {
                    info!("Killed MCP server '{}'", self.server_id);
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to kill MCP server '{}': {}", self.server_id, e);
                    Err(format!("Failed to kill server process: {}", e))
                }
            },
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn spawn_stderr_logger<R>(server_id: String, stderr: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    task::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => warn!("[MCP stderr - {}]: {}", server_id, line.trim_end()),
                Ok(None) => {
                    info!("MCP Server '{}' stderr closed", server_id);
                    break;
                }
                Err(e) => {
                    error!("Error reading MCP stderr for '{}': {}", server_id, e);
                    break;
                }
            }
        }
    });
}

fn spawn_stdin_writer<W>(server_id: String, writer: W, mut stdin_rx: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    task::spawn(async move {
        let mut writer = BufWriter::with_capacity(STDIO_BUFFER_SIZE, writer);
        while let Some(message) = stdin_rx.recv().await {
            debug!("Stdin({}): writing {} bytes", server_id, message.len());
            let written = async {
                writer.write_all(message.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await
            }
            .await;

            if let Err(e) = written {
                error!("Stdin({}): Error writing to server: {}", server_id, e);
                stdin_rx.close();
                break;
            }
        }
        info!("Stdin({}): Writer task finished.", server_id);
    });
}

fn spawn_stdout_reader<R>(server_id: String, reader: R, pending: PendingMap, closed: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    task::spawn(async move {
        let mut lines = BufReader::with_capacity(STDIO_BUFFER_SIZE, reader).lines();
        let reason = loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        dispatch_line(&server_id, line, &pending);
                    }
                }
                Ok(None) => {
                    info!("Stdout({}): Stream closed.", server_id);
                    break "Connection closed unexpectedly".to_string();
                }
                Err(e) => {
                    error!("Stdout({}): Error reading: {}", server_id, e);
                    break format!("Error reading server output: {}", e);
                }
            }
        };

        closed.store(true, Ordering::SeqCst);
        let drained: Vec<Responder> = lock(&pending).drain().map(|(_, tx)| tx).collect();
        if !drained.is_empty() {
            warn!(
                "Stdout({}): Reader exiting with {} pending requests.",
                server_id,
                drained.len()
            );
        }
        for responder in drained {
            let _ = responder.send(Err(JsonRpcError {
                code: -32001,
                message: reason.clone(),
                data: None,
            }));
        }
    });
}

fn dispatch_line(server_id: &str, line: &str, pending: &PendingMap) {
    let json_value = match serde_json::from_str::<Value>(line) {
        Ok(value) => value,
        Err(e) => {
            // Servers sometimes print stray text on stdout
            warn!("Stdout({}): Ignoring non-JSON line ({}): {}", server_id, e, line);
            return;
        }
    };

    let is_response = json_value.get("id").is_some()
        && (json_value.get("result").is_some() || json_value.get("error").is_some());

    if is_response {
        let response = match serde_json::from_value::<Response>(json_value) {
            Ok(response) => response,
            Err(e) => {
                error!("Stdout({}): Malformed response: {}. JSON: {}", server_id, e, line);
                return;
            }
        };
        let Some(id) = response.id.as_u64() else {
            warn!(
                "Stdout({}): Response with non-numeric id: {:?}",
                server_id, response.id
            );
            return;
        };
        match lock(pending).remove(&id) {
            Some(responder) => {
                if responder.send(Ok(response)).is_err() {
                    warn!("Stdout({}): Requester for id {} went away.", server_id, id);
                }
            }
            None => warn!(
                "Stdout({}): Received response for unknown or timed-out request ID: {}",
                server_id, id
            ),
        }
    } else if let Some(method) = json_value.get("method").and_then(Value::as_str) {
        debug!("Stdout({}): Server message '{}' ignored", server_id, method);
    } else {
        error!(
            "Stdout({}): Received JSON is not a recognizable RPC message: {}",
            server_id, line
        );
    }
}
