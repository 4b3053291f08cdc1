//! Entry points for applications: the adapter facade and the tool-injecting
//! client wrapper.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use gemini_core::{
    ChunkStream, GeminiResult, GenerateContentRequest, GenerateContentResponse, ModelProvider,
    StreamChunk,
};
use log::{error, info};
use tokio::runtime::Runtime;

use crate::catalog::{ToolCatalog, ToolDescriptor};
use crate::config::{AdapterConfig, McpServerConfig};
use crate::error::McpError;
use crate::host::SessionRegistry;
use crate::orchestrator::{splice_tool_result, AskOptions, ResponseOrchestrator, SpliceScope};
use crate::router::CallRouter;

/// Result of attaching one configured server.
#[derive(Debug)]
pub struct AttachOutcome {
    pub server_id: String,
    pub result: Result<Vec<ToolDescriptor>, McpError>,
}

/// Owns the registry and wires the router and orchestrator to its catalog.
#[derive(Debug)]
pub struct McpAdapter {
    config: AdapterConfig,
    registry: Arc<SessionRegistry>,
    router: CallRouter,
    orchestrator: ResponseOrchestrator,
    ask_options: AskOptions,
}

impl McpAdapter {
    pub fn new(config: AdapterConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(&config));
        let catalog = registry.catalog().clone();
        let router = CallRouter::new(catalog.clone(), config.tool_call_timeout());
        let orchestrator = ResponseOrchestrator::new(catalog, router.clone());
        let ask_options = AskOptions::from(&config);

        Self {
            config,
            registry,
            router,
            orchestrator,
            ask_options,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &CallRouter {
        &self.router
    }

    pub fn orchestrator(&self) -> &ResponseOrchestrator {
        &self.orchestrator
    }

    fn catalog(&self) -> &Arc<ToolCatalog> {
        self.registry.catalog()
    }

    /// Connects each configured server in order. A failure is logged and
    /// reported in its outcome; the remaining servers are still attempted.
    pub async fn attach(&self, servers: &[McpServerConfig]) -> Vec<AttachOutcome> {
        let mut outcomes = Vec::with_capacity(servers.len());
        for (i, server) in servers.iter().enumerate() {
            let server_id = if server.name.is_empty() {
                format!("server_{}", i)
            } else {
                server.name.clone()
            };

            let result = self
                .registry
                .connect(&server_id, &server.launch_spec(), server.env())
                .await;
            match &result {
                Ok(tools) => info!(
                    "Connected to MCP server '{}' ({} tools)",
                    server_id,
                    tools.len()
                ),
                Err(e) => error!("Failed to connect to MCP server '{}': {}", server_id, e),
            }
            outcomes.push(AttachOutcome { server_id, result });
        }
        outcomes
    }

    /// Blocking form of [`attach`](Self::attach) for synchronous callers that
    /// own a runtime.
    pub fn attach_blocking(&self, runtime: &Runtime, servers: &[McpServerConfig]) -> Vec<AttachOutcome> {
        runtime.block_on(self.attach(servers))
    }

    pub async fn ask(&self, query: &str, provider: &dyn ModelProvider, model_id: &str) -> String {
        self.orchestrator
            .ask(query, provider, model_id, &self.ask_options)
            .await
    }

    pub fn ask_streaming<'a>(
        &'a self,
        query: &'a str,
        provider: &'a dyn ModelProvider,
        model_id: &'a str,
    ) -> BoxStream<'a, StreamChunk> {
        self.orchestrator
            .ask_streaming(query, provider, model_id, &self.ask_options)
    }

    /// Wraps `inner` so that every request it sends carries the catalog's tools.
    pub fn wrap<P: ModelProvider>(&self, inner: P) -> McpGeminiClient<P> {
        McpGeminiClient {
            inner,
            catalog: self.catalog().clone(),
            router: self.router.clone(),
        }
    }

    pub async fn cleanup(&self) -> Result<(), McpError> {
        self.registry.cleanup().await
    }
}

/// A model provider that offers the adapter's tools on every request and
/// executes calls to them.
///
/// For `generate`, each function-call part naming a catalog tool gets the
/// tool's result written into its text. For `generate_stream`, the first such
/// call in the stream is executed and spliced in. Calls to tools the caller
/// declared itself are left alone.
#[derive(Debug)]
pub struct McpGeminiClient<P> {
    inner: P,
    catalog: Arc<ToolCatalog>,
    router: CallRouter,
}

impl<P> McpGeminiClient<P> {
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ModelProvider> ModelProvider for McpGeminiClient<P> {
    async fn generate(
        &self,
        model: &str,
        mut request: GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        let catalog = self.catalog.snapshot();
        request.append_function_declarations(catalog.function_declarations());

        let mut response = self.inner.generate(model, request).await?;
        for candidate in &mut response.candidates {
            let Some(content) = candidate.content.as_mut() else {
                continue;
            };
            for part in &mut content.parts {
                let Some(call) = part.function_call.as_ref() else {
                    continue;
                };
                if catalog.get(&call.name).is_none() {
                    continue;
                }
                let (_, result) = self.router.process_function_call(&catalog, call).await;
                part.text = Some(result);
            }
        }
        Ok(response)
    }

    async fn generate_stream(
        &self,
        model: &str,
        mut request: GenerateContentRequest,
    ) -> GeminiResult<ChunkStream> {
        let catalog = self.catalog.snapshot();
        request.append_function_declarations(catalog.function_declarations());

        let inner = self.inner.generate_stream(model, request).await?;
        Ok(splice_tool_result(
            self.router.clone(),
            catalog,
            inner,
            SpliceScope::CatalogOnly,
        ))
    }
}
