use serde::Deserialize;

use crate::application::ports::UpstreamEvent;
use crate::domain::DocumentSource;
use crate::protocol::{DONE_SENTINEL, data_payload, split_complete_lines};

#[derive(Deserialize)]
struct NativeEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    sources: Option<Vec<DocumentSource>>,
}

/// Line decoder for the generation service's event stream. Lines may carry a
/// `data:` prefix or be bare JSON; frames are separated by blank lines.
#[derive(Debug, Default)]
pub struct UpstreamDecoder {
    buffer: Vec<u8>,
}

impl UpstreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<UpstreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let (events, remaining) = {
            let (lines, remainder) = split_complete_lines(&self.buffer);
            let events: Vec<UpstreamEvent> = lines.into_iter().filter_map(decode_line).collect();
            (events, remainder.len())
        };
        let consumed = self.buffer.len() - remaining;
        self.buffer.drain(..consumed);
        events
    }

    /// Decodes a final line left without a terminator when the stream ends.
    pub fn finish(&mut self) -> Vec<UpstreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest).into_iter().collect()
    }
}

fn decode_line(line: &[u8]) -> Option<UpstreamEvent> {
    let line = match std::str::from_utf8(line) {
        Ok(line) => line.trim(),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping upstream line with invalid UTF-8");
            return None;
        }
    };
    let payload = native_payload(line)?;
    if payload == DONE_SENTINEL {
        return Some(UpstreamEvent::Done);
    }

    let native: NativeEvent = match serde_json::from_str(payload) {
        Ok(native) => native,
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed upstream event");
            return None;
        }
    };

    match (native.kind.as_str(), native.content, native.sources) {
        ("status", Some(text), _) => Some(UpstreamEvent::Status(text)),
        ("content", Some(text), _) => Some(UpstreamEvent::Content(text)),
        ("error", Some(text), _) => Some(UpstreamEvent::Error(text)),
        ("sources", _, Some(sources)) => Some(UpstreamEvent::Sources(sources)),
        ("done", _, _) => Some(UpstreamEvent::Done),
        (kind, _, _) => {
            tracing::warn!(kind = %kind, "Skipping unknown upstream event");
            None
        }
    }
}

fn native_payload(line: &str) -> Option<&str> {
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(payload) = data_payload(line) {
        return Some(payload);
    }
    if line.starts_with('{') || line == DONE_SENTINEL {
        return Some(line);
    }
    // `event:`, `id:` and `retry:` fields carry nothing we use.
    None
}
