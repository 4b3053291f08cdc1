use gemini_core::JsonRpcError;
use thiserror::Error;

/// Failures of connect-time, transport, configuration and cleanup operations.
///
/// Tool-call and exchange anomalies are not represented here; they surface as
/// `CallResult` values and fixed response texts instead.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Server ID '{0}' is already in use")]
    DuplicateServerId(String),

    #[error("Unsupported launch profile for '{script}': server script must be one of {supported}")]
    UnsupportedLaunchProfile { script: String, supported: String },

    #[error("Server '{server_id}': failed to launch: {message}")]
    LaunchFailed { server_id: String, message: String },

    #[error("Server '{server_id}': handshake failed: {message}")]
    HandshakeFailed { server_id: String, message: String },

    #[error("Server '{server_id}': failed to list tools: {message}")]
    ToolListingFailed { server_id: String, message: String },

    #[error("Server '{0}' is not connected")]
    NotConnected(String),

    #[error("Server '{server_id}': {error}")]
    Rpc {
        server_id: String,
        error: JsonRpcError,
    },

    #[error("Server '{server_id}': transport error: {message}")]
    Transport { server_id: String, message: String },

    #[error("Cleanup failed for {} server(s): {}", .0.len(), format_failures(.0))]
    CleanupFailed(Vec<(String, String)>),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(server_id, message)| format!("{}: {}", server_id, message))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<::config::ConfigError> for McpError {
    fn from(err: ::config::ConfigError) -> Self {
        McpError::Config(err.to_string())
    }
}

pub type McpResult<T> = Result<T, McpError>;
