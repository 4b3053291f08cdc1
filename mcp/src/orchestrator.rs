//! Drives one logical exchange with the model: offer the catalog as callable
//! functions, route a requested call, then ask the model to interpret the
//! tool's result.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use gemini_core::{
    ChunkStream, FunctionDeclaration, GeminiError, GenerateContentRequest, GenerationConfig,
    ModelProvider, ModelReply, StreamChunk, Tool,
};
use log::debug;

use crate::catalog::{Catalog, ToolCatalog};
use crate::config::AdapterConfig;
use crate::router::CallRouter;

pub const NO_SESSIONS_RESPONSE: &str =
    "Not connected to any MCP servers. Connect to at least one server first.";
pub const NO_RESPONSE: &str = "No response from the model.";

fn model_error(e: &GeminiError) -> String {
    format!("Error from model: {}", e)
}

/// Sampling settings applied to exchange requests.
#[derive(Debug, Clone, PartialEq)]
pub struct AskOptions {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<i32>,
}

impl Default for AskOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.2),
            max_output_tokens: None,
        }
    }
}

impl From<&AdapterConfig> for AskOptions {
    fn from(config: &AdapterConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

impl AskOptions {
    fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ExchangeState {
    AwaitingModel,
    Direct,
    AwaitingTool,
    AwaitingFollowUp,
    Done,
}

fn enter(state: ExchangeState) {
    debug!("Exchange state: {:?}", state);
}

fn initial_request(query: &str, declarations: Vec<FunctionDeclaration>, options: &AskOptions) -> GenerateContentRequest {
    let mut request = GenerateContentRequest::user_text(query);
    request.generation_config = Some(options.generation_config());
    if !declarations.is_empty() {
        request.tools = Some(vec![Tool {
            function_declarations: declarations,
        }]);
    }
    request
}

// No tools on the follow-up, so the model cannot chain another call
fn follow_up_request(query: &str, tool_name: &str, result: &str, options: &AskOptions) -> GenerateContentRequest {
    let prompt = format!(
        "I asked: {}\n\nThe tool {} returned: {}\n\nCan you explain this result?",
        query, tool_name, result
    );
    let mut request = GenerateContentRequest::user_text(prompt);
    request.generation_config = Some(options.generation_config());
    request
}

/// Which function calls a spliced stream acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SpliceScope {
    /// The first call of the stream, whatever its name.
    AnyCall,
    /// The first call naming a catalog tool; others pass through untouched.
    CatalogOnly,
}

/// Wraps `inner` so that the first qualifying function call is executed and
/// its chunk's text replaced with the tool result. Every other chunk is passed
/// through unchanged and in order.
pub(crate) fn splice_tool_result(
    router: CallRouter,
    catalog: Arc<Catalog>,
    mut inner: ChunkStream,
    scope: SpliceScope,
) -> ChunkStream {
    Box::pin(async_stream::stream! {
        let mut handled = false;
        while let Some(item) = inner.next().await {
            let mut chunk = match item {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(e);
                    continue;
                }
            };

            if !handled {
                let call = chunk
                    .first_function_call()
                    .filter(|call| scope == SpliceScope::AnyCall || catalog.get(&call.name).is_some())
                    .cloned();
                if let Some(call) = call {
                    handled = true;
                    let (_, result) = router.process_function_call(&catalog, &call).await;
                    chunk.text = Some(result);
                }
            }
            yield Ok(chunk);
        }
    })
}

/// Runs exchanges against the published catalog.
#[derive(Debug, Clone)]
pub struct ResponseOrchestrator {
    catalog: Arc<ToolCatalog>,
    router: CallRouter,
}

impl ResponseOrchestrator {
    pub fn new(catalog: Arc<ToolCatalog>, router: CallRouter) -> Self {
        Self { catalog, router }
    }

    /// Asks `query`, executing at most one tool call. Always returns text:
    /// failures are reported inside the answer.
    pub async fn ask(
        &self,
        query: &str,
        provider: &dyn ModelProvider,
        model_id: &str,
        options: &AskOptions,
    ) -> String {
        // The exchange keeps this snapshot even if the topology changes meanwhile
        let catalog = self.catalog.snapshot();
        if !catalog.has_sessions() {
            return NO_SESSIONS_RESPONSE.to_string();
        }

        enter(ExchangeState::AwaitingModel);
        let request = initial_request(query, catalog.function_declarations(), options);
        let response = match provider.generate(model_id, request).await {
            Ok(response) => response,
            Err(e) => return model_error(&e),
        };

        let call = match ModelReply::from_response(&response) {
            ModelReply::Empty => return NO_RESPONSE.to_string(),
            ModelReply::Text(text) => {
                enter(ExchangeState::Direct);
                return text;
            }
            ModelReply::FunctionCall(call) => call,
        };

        enter(ExchangeState::AwaitingTool);
        let (tool_name, result) = self.router.process_function_call(&catalog, &call).await;

        enter(ExchangeState::AwaitingFollowUp);
        let follow_up = follow_up_request(query, &tool_name, &result, options);
        let final_text = match provider.generate(model_id, follow_up).await {
            Ok(response) => match ModelReply::from_response(&response) {
                ModelReply::Text(text) => text,
                _ => NO_RESPONSE.to_string(),
            },
            Err(e) => model_error(&e),
        };

        enter(ExchangeState::Done);
        format!("[Tool Used: {}]\n\n{}\n\n{}", tool_name, result, final_text)
    }

    /// Streaming form of [`ask`](Self::ask). The stream is lazy and single
    /// pass; only the first function call in it is executed.
    pub fn ask_streaming<'a>(
        &'a self,
        query: &'a str,
        provider: &'a dyn ModelProvider,
        model_id: &'a str,
        options: &'a AskOptions,
    ) -> BoxStream<'a, StreamChunk> {
        Box::pin(async_stream::stream! {
            let catalog = self.catalog.snapshot();
            if !catalog.has_sessions() {
                yield StreamChunk::text(NO_SESSIONS_RESPONSE);
            } else {
                enter(ExchangeState::AwaitingModel);
                let request = initial_request(query, catalog.function_declarations(), options);
                match provider.generate_stream(model_id, request).await {
                    Err(e) => {
                        yield StreamChunk::text(model_error(&e));
                    }
                    Ok(inner) => {
                        let mut chunks = splice_tool_result(
                            self.router.clone(),
                            catalog,
                            inner,
                            SpliceScope::AnyCall,
                        );
                        let mut yielded = false;
                        while let Some(item) = chunks.next().await {
                            match item {
                                Ok(chunk) => {
                                    yielded = true;
                                    yield chunk;
                                }
                                Err(e) => {
                                    yielded = true;
                                    yield StreamChunk::text(model_error(&e));
                                    break;
                                }
                            }
                        }
                        if !yielded {
                            yield StreamChunk::text(NO_RESPONSE);
                        }
                        enter(ExchangeState::Done);
                    }
                }
            }
        })
    }
}
