use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::McpError;
use crate::launch::LaunchSpec;

const APP_NAME: &str = "gemini-mcp";

/// One tool server entry of `mcp_servers.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    /// Server id; the attach order index is used when left empty
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Path to the server script (`.py` or `.js`)
    pub script: PathBuf,
    // Additional args, appended after the script path
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

fn default_enabled() -> bool {
    true
}

impl McpServerConfig {
    pub fn new(name: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            script: script.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn launch_spec(&self) -> LaunchSpec {
        LaunchSpec::new(self.script.clone()).with_args(self.args.clone())
    }

    /// Extra environment for the server process, if any was configured.
    pub fn env(&self) -> Option<&HashMap<String, String>> {
        if self.env.is_empty() {
            None
        } else {
            Some(&self.env)
        }
    }
}

/// What happens when two servers expose a tool with the same name.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The tool registered first stays; later duplicates are dropped with a warning.
    #[default]
    KeepFirst,
    /// The most recently registered server's tool replaces the earlier one.
    ReplaceExisting,
}

/// Adapter behaviour settings.
///
/// Loaded from an optional TOML file, then overridden by `GEMINI_MCP_*`
/// environment variables (for example `GEMINI_MCP_TOOL_CALL_TIMEOUT_SECS`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AdapterConfig {
    pub tool_call_timeout_secs: u64,
    pub initialize_timeout_secs: u64,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<i32>,
    pub collision_policy: CollisionPolicy,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            tool_call_timeout_secs: 30,
            initialize_timeout_secs: 10,
            temperature: Some(0.2),
            max_output_tokens: None,
            collision_policy: CollisionPolicy::KeepFirst,
        }
    }
}

impl AdapterConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, McpError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(::config::Environment::with_prefix("GEMINI_MCP").try_parsing(true))
            .build()?;

        let loaded: Self = settings.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), McpError> {
        if self.tool_call_timeout_secs == 0 {
            return Err(McpError::Config(
                "tool_call_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.initialize_timeout_secs == 0 {
            return Err(McpError::Config(
                "initialize_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tool_call_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_call_timeout_secs)
    }

    pub fn initialize_timeout(&self) -> Duration {
        Duration::from_secs(self.initialize_timeout_secs)
    }
}

pub fn get_config_dir() -> io::Result<PathBuf> {
    gemini_core::get_default_config_dir(APP_NAME)
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))
}

pub fn get_mcp_config_path() -> io::Result<PathBuf> {
    Ok(get_config_dir()?.join("mcp_servers.json"))
}

pub fn load_mcp_servers() -> Result<Vec<McpServerConfig>, McpError> {
    let config_path = get_mcp_config_path()?;
    load_mcp_servers_from_path(&config_path)
}

pub fn load_mcp_servers_from_path(config_path: &Path) -> Result<Vec<McpServerConfig>, McpError> {
    if !config_path.exists() {
        // It's okay if the file doesn't exist, just return an empty list.
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(config_path).map_err(|e| {
        McpError::Config(format!(
            "Error reading MCP config file {}: {}",
            config_path.display(),
            e
        ))
    })?;

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let servers: Vec<McpServerConfig> = serde_json::from_str(&content).map_err(|e| {
        McpError::Config(format!(
            "Error parsing MCP config file {}: {}",
            config_path.display(),
            e
        ))
    })?;

    // Filter out disabled servers
    Ok(servers.into_iter().filter(|s| s.enabled).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_mcp_servers_file_not_exist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("non_existent_mcp_servers.json");
        assert!(load_mcp_servers_from_path(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_mcp_servers_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty_mcp_servers.json");
        fs::write(&path, "  \n").unwrap();
        assert!(load_mcp_servers_from_path(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_mcp_servers_valid_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("valid_mcp_servers.json");
        let content = r#"
        [
          {
            "name": "calculator",
            "script": "servers/calculator_server.py",
            "env": { "PYTHONUNBUFFERED": "1" }
          },
          {
            "name": "weather",
            "enabled": false,
            "script": "servers/weather_server.py"
          },
          {
            "script": "servers/search.js",
            "args": ["--verbose"]
          }
        ]
        "#;
        fs::write(&path, content).unwrap();

        let servers = load_mcp_servers_from_path(&path).unwrap();
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].name, "calculator");
        assert_eq!(
            servers[0].env().and_then(|env| env.get("PYTHONUNBUFFERED")),
            Some(&"1".to_string())
        );
        assert!(servers[1].name.is_empty());
        assert!(servers[1].env().is_none());
        assert_eq!(
            servers[1].launch_spec(),
            LaunchSpec::new("servers/search.js").with_args(vec!["--verbose".to_string()])
        );
    }

    #[test]
    fn test_load_mcp_servers_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid_mcp_servers.json");
        fs::write(&path, "[{\"name\": \"missing script\"}]").unwrap();
        assert!(matches!(
            load_mcp_servers_from_path(&path),
            Err(McpError::Config(_))
        ));
    }

    #[test]
    fn test_adapter_config_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("adapter.toml");
        fs::write(
            &path,
            "tool_call_timeout_secs = 5\ncollision_policy = \"replace_existing\"\n",
        )
        .unwrap();

        let config = AdapterConfig::load(Some(&path)).unwrap();
        assert_eq!(config.tool_call_timeout(), Duration::from_secs(5));
        assert_eq!(config.collision_policy, CollisionPolicy::ReplaceExisting);
        // Untouched keys keep their defaults
        assert_eq!(config.initialize_timeout_secs, 10);
        assert_eq!(config.temperature, Some(0.2));
    }

    #[test]
    fn test_adapter_config_rejects_zero_timeout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("adapter.toml");
        fs::write(&path, "tool_call_timeout_secs = 0\n").unwrap();
        assert!(matches!(
            AdapterConfig::load(Some(&path)),
            Err(McpError::Config(_))
        ));
    }
}
