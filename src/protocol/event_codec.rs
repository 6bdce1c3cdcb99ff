use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::domain::{DocumentSource, StreamEvent};

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";

/// JSON body of a `data:` line. Every field is optional; `classify` decides
/// which event a payload carries.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WirePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sources: Option<Vec<DocumentSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    answer: Option<String>,
}

impl WirePayload {
    fn from_event(event: &StreamEvent) -> Self {
        match event {
            StreamEvent::Token(text) => Self {
                token: Some(text.clone()),
                ..Self::default()
            },
            StreamEvent::Status(text) => Self {
                status: Some(text.clone()),
                ..Self::default()
            },
            StreamEvent::Sources(sources) => Self {
                sources: Some(sources.clone()),
                ..Self::default()
            },
            StreamEvent::Done { answer, sources } => Self {
                done: Some(true),
                answer: answer.clone(),
                sources: sources.clone(),
                ..Self::default()
            },
        }
    }

    fn classify(self) -> Option<StreamEvent> {
        if self.done == Some(true) {
            return Some(StreamEvent::Done {
                answer: self.answer,
                sources: self.sources,
            });
        }
        if let Some(sources) = self.sources {
            return Some(StreamEvent::Sources(sources));
        }
        if let Some(status) = self.status {
            return Some(StreamEvent::Status(status));
        }
        self.token.or(self.content).map(StreamEvent::Token)
    }
}

/// Serializes one event as a `data: <json>\n\n` frame.
pub fn encode(event: &StreamEvent) -> Bytes {
    let payload = WirePayload::from_event(event);
    // Plain owned strings and numbers only, so serialization cannot fail.
    let json = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("{} {}\n\n", DATA_PREFIX, json))
}

pub fn encode_done_sentinel() -> Bytes {
    Bytes::from(format!("{} {}\n\n", DATA_PREFIX, DONE_SENTINEL))
}

/// Splits `buffer` into its newline-terminated lines (terminators stripped)
/// and the trailing bytes that do not yet form a complete line.
pub fn split_complete_lines(buffer: &[u8]) -> (Vec<&[u8]>, &[u8]) {
    let mut lines = Vec::new();
    let mut start = 0;
    while let Some(offset) = buffer[start..].iter().position(|b| *b == b'\n') {
        let end = start + offset;
        let line = &buffer[start..end];
        lines.push(line.strip_suffix(b"\r").unwrap_or(line));
        start = end + 1;
    }
    (lines, &buffer[start..])
}

/// Decodes every complete line in `buffer`.
///
/// Returns the decoded events and the unconsumed remainder, which the caller
/// prepends to the next chunk. Malformed or unrecognised payloads are logged
/// and skipped.
pub fn decode(buffer: &[u8]) -> (Vec<StreamEvent>, &[u8]) {
    let (lines, remainder) = split_complete_lines(buffer);
    let events = lines.into_iter().filter_map(decode_line).collect();
    (events, remainder)
}

fn decode_line(line: &[u8]) -> Option<StreamEvent> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping frame with invalid UTF-8");
            return None;
        }
    };

    let payload = data_payload(line)?;
    if payload == DONE_SENTINEL {
        return Some(StreamEvent::done());
    }

    match serde_json::from_str::<WirePayload>(payload) {
        Ok(parsed) => {
            let event = parsed.classify();
            if event.is_none() {
                tracing::warn!(payload = %payload, "Dropping frame with unrecognised shape");
            }
            event
        }
        Err(e) => {
            tracing::warn!(error = %e, payload = %payload, "Dropping malformed frame");
            None
        }
    }
}

/// The payload of a `data:` line, or `None` for blank, comment and other
/// field lines.
pub(crate) fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DATA_PREFIX)?;
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    let payload = rest.trim();
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

