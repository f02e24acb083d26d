//! Server-sent event decoding for streamed chat completions

use std::fmt::Display;

use chat_protocol::ChatCompletionChunk;
use eventsource_stream::{Event, Eventsource};
use futures::{future, Stream, StreamExt};
use tracing::debug;

use crate::errors::DeployError;

const DONE_MARKER: &str = "[DONE]";

/// A decoded stream event
#[derive(Debug, Clone)]
pub enum SseEvent {
    Chunk(ChatCompletionChunk),
    Done,
}

/// Decode a streamed response body into chat events
///
/// Events carrying no data, such as keep-alive comments, are skipped.
pub fn chat_events<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseEvent, DeployError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    bytes.eventsource().filter_map(|event| {
        future::ready(match event {
            Ok(event) if event.data.is_empty() => None,
            Ok(event) => Some(parse_event(&event)),
            Err(e) => Some(Err(DeployError::ChatError(format!(
                "stream interrupted: {}",
                e
            )))),
        })
    })
}

/// Interpret the data of one event
pub fn parse_event(event: &Event) -> Result<SseEvent, DeployError> {
    if event.data.trim() == DONE_MARKER {
        debug!("Received [DONE] marker");
        return Ok(SseEvent::Done);
    }

    serde_json::from_str::<ChatCompletionChunk>(&event.data)
        .map(SseEvent::Chunk)
        .map_err(|e| {
            DeployError::ChatError(format!("malformed stream chunk: {} ({})", e, event.data))
        })
}
