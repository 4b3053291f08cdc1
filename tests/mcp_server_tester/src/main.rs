use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use gemini_core::{GeminiClient, GeminiConfig, API_KEY_ENV};
use gemini_mcp::{load_mcp_servers_from_path, AdapterConfig, McpAdapter};
use log::{debug, error, info, warn};

/// Smoke test for MCP tool servers behind the Gemini adapter
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server list (defaults to tests/mcp_servers.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Adapter settings file (TOML)
    #[arg(long)]
    adapter_config: Option<PathBuf>,

    /// Tool to call directly
    #[arg(long, default_value = "add")]
    tool: String,

    /// JSON arguments for the direct call
    #[arg(long, default_value = r#"{"a": 40, "b": 2}"#)]
    tool_args: String,

    /// Query for the model exchange (needs GEMINI_API_KEY)
    #[arg(long, default_value = "What is 40 + 2?")]
    query: String,

    /// Model to use instead of the configured default
    #[arg(long)]
    model: Option<String>,

    /// Use the streaming exchange
    #[arg(long, default_value_t = false)]
    stream: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .filter_module("gemini_mcp", log::LevelFilter::Debug)
        .filter_module("mcp_server_tester", log::LevelFilter::Debug)
        .format_timestamp_millis()
        .init();
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => Path::new(env!("CARGO_MANIFEST_DIR"))
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Could not get parent directory"))?
            .join("mcp_servers.json"),
    };

    debug!("Reading MCP configuration from: {}", config_path.display());
    let servers = load_mcp_servers_from_path(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    let adapter_config = AdapterConfig::load(args.adapter_config.as_deref())
        .context("Failed to load adapter settings")?;

    let adapter = McpAdapter::new(adapter_config);
    info!("Attaching {} server(s)...", servers.len());
    let outcomes = adapter.attach(&servers).await;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        warn!("{} of {} server(s) failed to connect", failed, outcomes.len());
    }

    let result = exercise(&adapter, &args).await;

    info!("Cleaning up...");
    if let Err(e) = adapter.cleanup().await {
        error!("Cleanup reported failures: {}", e);
    }
    result
}

async fn exercise(adapter: &McpAdapter, args: &Args) -> Result<()> {
    let catalog = adapter.registry().catalog().snapshot();
    info!("Catalog has {} tool(s):", catalog.len());
    for tool in catalog.tools() {
        info!("  - {} [{}]: {}", tool.name, tool.owning_server_id, tool.description);
    }

    let tool_args = serde_json::from_str(&args.tool_args)
        .with_context(|| format!("Invalid --tool-args JSON: {}", args.tool_args))?;
    let result = adapter.router().call_tool(&args.tool, tool_args).await;
    info!("Direct call {} -> {}", args.tool, result);

    let gemini_config = GeminiConfig::load("gemini-mcp")
        .context("Failed to load Gemini configuration")?
        .merge(&GeminiConfig {
            api_key: None,
            model_name: args.model.clone(),
        });
    if gemini_config.api_key.is_none() {
        info!("{} not set, skipping model exchange", API_KEY_ENV);
        return Ok(());
    }

    let client = GeminiClient::new(gemini_config).context("Failed to create Gemini client")?;
    let model = client.default_model().to_string();

    info!("Asking {}: {}", model, args.query);
    if args.stream {
        let mut chunks = adapter.ask_streaming(&args.query, &client, &model);
        while let Some(chunk) = chunks.next().await {
            if let Some(text) = chunk.text {
                println!("{}", text);
            }
        }
    } else {
        println!("{}", adapter.ask(&args.query, &client, &model).await);
    }
    Ok(())
}
