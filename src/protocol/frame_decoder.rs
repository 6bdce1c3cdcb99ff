use crate::domain::StreamEvent;

use super::event_codec::decode;

/// Chunk-boundary-safe decoder for one exchange's byte stream.
///
/// Buffers incomplete trailing data between `push` calls and stops yielding
/// events once a `Done` has been decoded.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    finished: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        self.buffer.extend_from_slice(chunk);
        let (mut events, remaining) = {
            let (events, remainder) = decode(&self.buffer);
            (events, remainder.len())
        };
        let consumed = self.buffer.len() - remaining;
        self.buffer.drain(..consumed);

        if let Some(done_at) = events.iter().position(StreamEvent::is_done) {
            let ignored = events.len() - done_at - 1;
            if ignored > 0 {
                tracing::debug!(ignored, "Ignoring events after Done");
            }
            events.truncate(done_at + 1);
            self.finished = true;
            self.buffer.clear();
        }

        events
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes held back waiting for a line terminator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
