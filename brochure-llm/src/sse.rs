//! Incremental decoding of streamed HTTP bodies.
//!
//! Providers deliver streamed replies either as server-sent events (OpenAI,
//! Anthropic) or as newline-delimited JSON (Ollama). Both are line oriented;
//! chunks from the transport may split a line (or a UTF-8 code point)
//! anywhere, so bytes are buffered until a full line is available.

use async_stream::try_stream;
use brochure_common::{BrochureError, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Split a chunked body into lines without their `\n` / `\r\n` terminators.
/// A trailing unterminated line is yielded at end of input.
pub fn lines<S, E>(body: S) -> impl Stream<Item = Result<String>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    try_stream! {
        let mut body = Box::pin(body);
        let mut buf: Vec<u8> = Vec::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| BrochureError::Stream(e.to_string()))?;
            buf.extend_from_slice(&chunk);

            while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = buf.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                yield String::from_utf8_lossy(&line).into_owned();
            }
        }

        if !buf.is_empty() {
            yield String::from_utf8_lossy(&buf).into_owned();
        }
    }
}

/// Decode a `text/event-stream` body into events. Comment lines and fields
/// other than `event` / `data` are ignored; multi-line data is joined with
/// `\n`.
pub fn sse_events<S, E>(body: S) -> impl Stream<Item = Result<SseEvent>> + Send
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let lines = lines(body);
    try_stream! {
        let mut lines = Box::pin(lines);
        let mut event: Option<String> = None;
        let mut data: Vec<String> = Vec::new();

        while let Some(line) = lines.next().await {
            let line = line?;
            if line.is_empty() {
                if !data.is_empty() {
                    yield SseEvent { event: event.take(), data: data.join("\n") };
                    data.clear();
                }
                event = None;
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_str(), ""),
            };
            match field {
                "event" => event = Some(value.to_string()),
                "data" => data.push(value.to_string()),
                _ => {}
            }
        }

        if !data.is_empty() {
            yield SseEvent { event: event.take(), data: data.join("\n") };
        }
    }
}
