use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// Basic JSON-RPC Structures shared by the MCP adapter and its tool servers

/// Represents a JSON-RPC Request object.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Request {
    pub jsonrpc: String,   // Should always be "2.0"
    pub id: Option<Value>, // Request ID (number or string), null if notification
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>, // Structured value or array
}

impl Request {
    pub fn new(id: Option<Value>, method: String, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            method,
            params,
        }
    }
}

/// Represents a JSON-RPC Response object.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Response {
    pub jsonrpc: String, // Should always be "2.0"
    pub id: Value,       // Must match the request ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Convenience method to extract the result or return the error.
    pub fn result(&self) -> Result<Value, JsonRpcError> {
        if let Some(err) = &self.error {
            Err(err.clone())
        } else if let Some(res) = &self.result {
            Ok(res.clone())
        } else {
            // Void methods may answer with a null result.
            Ok(Value::Null)
        }
    }
}

/// Represents a JSON-RPC Error object.
#[derive(Error, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: -32603,
            message: message.into(),
            data: None,
        }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC Error (code {}): {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " (Data: {})", data)?;
        }
        Ok(())
    }
}

// MCP tool structures

/// Definition of a tool as reported by `tools/list`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Tool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    // Older hosts called this `parameters`
    #[serde(
        rename = "inputSchema",
        alias = "parameters",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub input_schema: Option<Value>,
}

/// One item of a `tools/call` result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ContentItem {
    #[serde(rename = "type", default = "default_content_type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Any other fields (image data, embedded resources, annotations)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_content_type() -> String {
    "text".to_string()
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: default_content_type(),
            text: Some(text.into()),
            extra: Map::new(),
        }
    }
}

/// Result of `tools/call`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}
