// MCP tool calling for Gemini:
// - Sessions with tool servers (launch, handshake, teardown)
// - A unified tool catalog with schemas cleaned for Gemini
// - Routing of function calls to the owning server
// - Orchestration of model exchanges around a tool round trip

pub mod adapter;
pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod launch;
pub mod orchestrator;
pub mod router;
pub mod rpc;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{AttachOutcome, McpAdapter, McpGeminiClient};
pub use catalog::{Catalog, ToolCatalog, ToolDescriptor};
pub use config::{
    get_mcp_config_path, load_mcp_servers, load_mcp_servers_from_path, AdapterConfig,
    CollisionPolicy, McpServerConfig,
};
pub use error::{McpError, McpResult};
pub use host::{ServerSession, SessionRegistry, StdioTransport, Transport};
pub use launch::{LaunchProfile, LaunchSpec, LAUNCH_PROFILES};
pub use orchestrator::{AskOptions, ResponseOrchestrator, NO_RESPONSE, NO_SESSIONS_RESPONSE};
pub use router::{CallResult, CallRouter};
pub use schema::normalize_schema;
