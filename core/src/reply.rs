//! Tagged views of model output.
//!
//! Responses are inspected once, here, and everything downstream matches on
//! [`ModelReply`] or reads [`StreamChunk`] fields instead of probing the raw
//! response shape.

use crate::types::{FunctionCall, GenerateContentResponse, PartResponse};

/// What the first candidate of a response asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// Plain text, all text parts of the first candidate concatenated.
    Text(String),
    /// The first content part requests a function call.
    FunctionCall(FunctionCall),
    /// No candidates, no content, or no usable parts.
    Empty,
}

impl ModelReply {
    pub fn from_response(response: &GenerateContentResponse) -> Self {
        let parts = match first_candidate_parts(response) {
            Some(parts) if !parts.is_empty() => parts,
            _ => return ModelReply::Empty,
        };

        if let Some(call) = &parts[0].function_call {
            return ModelReply::FunctionCall(call.clone());
        }

        match concat_text(parts) {
            Some(text) => ModelReply::Text(text),
            None => ModelReply::Empty,
        }
    }
}

/// One element of a streamed response.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamChunk {
    pub text: Option<String>,
    pub function_calls: Vec<FunctionCall>,
    pub finish_reason: Option<String>,
}

impl StreamChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn from_response(response: &GenerateContentResponse) -> Self {
        let finish_reason = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.clone());
        let parts = first_candidate_parts(response).unwrap_or(&[]);

        Self {
            text: concat_text(parts),
            function_calls: parts
                .iter()
                .filter_map(|p| p.function_call.clone())
                .collect(),
            finish_reason,
        }
    }

    pub fn first_function_call(&self) -> Option<&FunctionCall> {
        self.function_calls.first()
    }
}

fn first_candidate_parts(response: &GenerateContentResponse) -> Option<&[PartResponse]> {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| content.parts.as_slice())
}

fn concat_text(parts: &[PartResponse]) -> Option<String> {
    let texts: Vec<&str> = parts.iter().filter_map(|p| p.text.as_deref()).collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.concat())
    }
}
