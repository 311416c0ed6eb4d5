//! Line decoder for the `/sql-query` event stream
//!
//! The backend writes one `data: <json>` line per status update. This module
//! turns the raw response body into a lazy [`EventStream`] of typed
//! [`StreamEvent`]s:
//!
//! - Lines are split on `\n` (a trailing `\r` is stripped) and decoded only
//!   once complete, so multi-byte characters may straddle chunk boundaries.
//! - Only `data:` lines carry events; blank lines, comments and other SSE
//!   fields are ignored.
//! - A payload that is not valid JSON, or has an unknown `status`, is skipped
//!   with a warning.
//! - The first `completed` or `error` event ends the stream.
//! - A transport failure while reading is reported as a single `error` event.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::api::types::StreamEvent;
use crate::error::SqlChatError;

/// Lazy, finite, non-restartable sequence of decoded query events.
pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

type ByteStream<E> = Pin<Box<dyn Stream<Item = Result<Bytes, E>> + Send>>;

struct DecoderState<E> {
    inner: ByteStream<E>,
    buffer: Vec<u8>,
    scanned: usize,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl<E> DecoderState<E> {
    /// Append `chunk` and decode every line it completes.
    ///
    /// Bytes before `scanned` are known to hold no newline, so each byte is
    /// searched once.
    fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = self.buffer[start..end].to_vec();
            self.push_line(&line);
            start = end + 1;
            self.scanned = start;
        }

        if start > 0 {
            self.buffer.drain(..start);
        }
        self.scanned = self.buffer.len();
    }

    fn flush_remainder(&mut self) {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.scanned = 0;
            self.push_line(&line);
        }
    }

    fn push_line(&mut self, raw: &[u8]) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        match parse_data_line(&line) {
            Ok(Some(event)) => self.pending.push_back(event),
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping stream line: {}", e),
        }
    }
}

/// Decode a single stream line.
///
/// Returns `Ok(None)` for lines that carry no event.
///
/// # Errors
///
/// Returns [`SqlChatError::Protocol`] when a `data:` payload is not a valid
/// event object.
///
/// # Examples
///
/// ```
/// use sqlchat::api::sse::parse_data_line;
/// use sqlchat::api::StreamEvent;
///
/// let event = parse_data_line(r#"data: {"status":"completed","reasoning":"42"}"#).unwrap();
/// assert_eq!(event, Some(StreamEvent::Completed { reasoning: Some("42".into()) }));
/// assert_eq!(parse_data_line(": keep-alive").unwrap(), None);
/// ```
pub fn parse_data_line(line: &str) -> Result<Option<StreamEvent>, SqlChatError> {
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload).trim_end();
    if payload.is_empty() {
        return Ok(None);
    }

    serde_json::from_str::<StreamEvent>(payload)
        .map(Some)
        .map_err(|e| SqlChatError::Protocol(format!("{} in {:?}", e, truncate(payload, 120))))
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Turn a raw response body into an [`EventStream`].
///
/// Nothing is read until the returned stream is polled.
pub fn decode_event_stream<S, E>(byte_stream: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecoderState {
        inner: Box::pin(byte_stream) as ByteStream<E>,
        buffer: Vec::new(),
        scanned: 0,
        pending: VecDeque::new(),
        finished: false,
    };

    Box::pin(futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(event) = state.pending.pop_front() {
                if event.is_terminal() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((event, state));
            }
            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => state.push_chunk(&chunk),
                Some(Err(e)) => {
                    tracing::warn!("Query stream interrupted: {}", e);
                    state.finished = true;
                    state.pending.clear();
                    return Some((StreamEvent::error(e.to_string()), state));
                }
                None => {
                    state.finished = true;
                    state.flush_remainder();
                }
            }
        }
    }))
}
