use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::errors::GeminiResult;
use crate::reply::StreamChunk;
use crate::types::{GenerateContentRequest, GenerateContentResponse};

/// Lazy, single-pass sequence of streamed chunks.
pub type ChunkStream = Pin<Box<dyn Stream<Item = GeminiResult<StreamChunk>> + Send>>;

/// The request interface of a model provider.
///
/// `GeminiClient` implements it over HTTP; wrappers that add behavior (such as
/// tool injection) implement it too and delegate to an inner provider.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a complete response with `model`.
    async fn generate(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse>;

    /// Generate a streamed response with `model`.
    async fn generate_stream(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> GeminiResult<ChunkStream>;
}
