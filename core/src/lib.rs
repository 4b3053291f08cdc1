// Core Gemini API functionality shared by the MCP adapter:
// - API client for Gemini, including streaming
// - Request/response data structures and the tagged reply view
// - The model-provider seam the adapter wraps
// - Configuration loading
// - Shared error types and JSON-RPC structures

pub mod client;
pub use client::*;

pub mod types;
pub use types::*;

pub mod reply;
pub use reply::{ModelReply, StreamChunk};

pub mod provider;
pub use provider::{ChunkStream, ModelProvider};

mod streaming;

pub mod config;
pub use config::*;

pub mod errors;
pub use errors::*;

pub mod rpc_types;
pub use rpc_types::{
    CallToolResult, ContentItem, JsonRpcError, Request, Response, Tool as RpcTool,
};
