// Server-sent-event decoding for `streamGenerateContent?alt=sse`

use std::fmt::Display;

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::errors::{GeminiError, GeminiResult};
use crate::provider::ChunkStream;
use crate::reply::StreamChunk;
use crate::types::GenerateContentResponse;

/// Parses one SSE line. Returns `None` for comments, keep-alives and
/// non-data fields.
pub(crate) fn parse_sse_line(line: &str) -> Option<GeminiResult<GenerateContentResponse>> {
    let line = line.trim_end_matches('\r');
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    Some(
        serde_json::from_str::<GenerateContentResponse>(data)
            .map_err(|e| GeminiError::ParsingError(format!("Invalid stream event: {}", e))),
    )
}

/// Turns an HTTP body into a chunk stream, one chunk per `data:` event.
pub(crate) fn chunk_stream<S, B, E>(body: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut bytes = Box::pin(body);

    let stream = async_stream::stream! {
        let mut buffer = String::new();
        while let Some(next) = bytes.next().await {
            match next {
                Ok(data) => buffer.push_str(&String::from_utf8_lossy(data.as_ref())),
                Err(e) => {
                    yield Err(GeminiError::StreamError(format!("Stream read error: {}", e)));
                    return;
                }
            }

            while let Some(line_end) = buffer.find('\n') {
                let line: String = buffer.drain(..=line_end).collect();
                if let Some(event) = parse_sse_line(&line) {
                    debug!("Gemini stream event received");
                    yield event.map(|response| StreamChunk::from_response(&response));
                }
            }
        }

        // Trailing event without a final newline
        if let Some(event) = parse_sse_line(&buffer) {
            yield event.map(|response| StreamChunk::from_response(&response));
        }
    };

    Box::pin(stream)
}
