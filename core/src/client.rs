use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::errors::{GeminiError, GeminiResult};
use crate::provider::{ChunkStream, ModelProvider};
use crate::streaming;
use crate::types::*;

const API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Client for interacting with the Gemini API
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    model: GeminiModel,
}

impl GeminiClient {
    /// Create a new Gemini API client
    pub fn new(config: GeminiConfig) -> GeminiResult<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            GeminiError::ConfigError(
                "API key is required to initialize the Gemini client".to_string(),
            )
        })?;

        let model = GeminiModel::new(api_key, config.model_name);

        let client = Client::new();

        Ok(Self { client, model })
    }

    /// The model used when callers do not name one
    pub fn default_model(&self) -> &str {
        &self.model.model_name
    }

    fn endpoint(&self, model: &str, operation: &str) -> String {
        let mut url = format!(
            "{}/{}:{}?key={}",
            API_BASE_URL, model, operation, self.model.api_key
        );
        if operation == "streamGenerateContent" {
            url.push_str("&alt=sse");
        }
        url
    }

    async fn post(
        &self,
        model: &str,
        operation: &str,
        request: &GenerateContentRequest,
    ) -> GeminiResult<reqwest::Response> {
        debug!(model, operation, "Sending Gemini request");

        let response = self
            .client
            .post(self.endpoint(model, operation))
            .json(request)
            .send()
            .await
            .map_err(|e| GeminiError::RequestError(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.map_err(|e| {
                GeminiError::ResponseError(format!("Failed to read error response: {}", e))
            })?;

            return Err(GeminiError::HttpError {
                status_code: status.as_u16(),
                message: format!("API request failed: {}", error_body),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ModelProvider for GeminiClient {
    async fn generate(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> GeminiResult<GenerateContentResponse> {
        let response = self.post(model, "generateContent", &request).await?;

        let response_body = response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| GeminiError::ParsingError(format!("Failed to parse response: {}", e)))?;

        Ok(response_body)
    }

    async fn generate_stream(
        &self,
        model: &str,
        request: GenerateContentRequest,
    ) -> GeminiResult<ChunkStream> {
        let response = self.post(model, "streamGenerateContent", &request).await?;
        Ok(streaming::chunk_stream(response.bytes_stream()))
    }
}
