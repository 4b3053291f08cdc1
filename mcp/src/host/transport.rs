use async_trait::async_trait;
use gemini_core::{JsonRpcError, Request, Response};

use crate::rpc::Notification;

/// A request/response channel to one tool server.
///
/// Implementations match responses to requests by numeric id. Callers issue at
/// most one request at a time per transport (`ServerSession` enforces this).
#[async_trait]
pub trait Transport: Send + Sync {
    // Send a request to the server and wait for its response
    async fn send_request(&self, request: Request) -> Result<Response, JsonRpcError>;

    // Send a notification to the server (no response expected)
    async fn send_notification(&self, notification: Notification) -> Result<(), String>;

    // Release the underlying resources (child process, pipes)
    async fn shutdown(&self) -> Result<(), String>;

    // True once the server side is gone (process exited, pipe closed) or after shutdown
    fn is_closed(&self) -> bool;
}
