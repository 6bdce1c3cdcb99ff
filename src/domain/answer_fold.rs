use super::{Message, StreamEvent};

/// Applies one stream event to the in-flight assistant message.
///
/// A `Done` carrying an `answer` replaces the accumulated token text: the
/// server's assembled answer is authoritative for display, even when it
/// differs from the concatenated tokens (whitespace or formatting changes).
/// `Status` never touches the message.
pub fn reduce(mut message: Message, event: &StreamEvent) -> Message {
    match event {
        StreamEvent::Token(text) => {
            message.content.push_str(text);
        }
        StreamEvent::Sources(sources) => {
            message.sources = Some(sources.clone());
        }
        StreamEvent::Status(_) => {}
        StreamEvent::Done { answer, sources } => {
            if let Some(answer) = answer {
                message.content = answer.clone();
            }
            if let Some(sources) = sources {
                message.sources = Some(sources.clone());
            }
            message.streaming = false;
        }
    }
    message
}
