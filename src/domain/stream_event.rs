use super::DocumentSource;

/// One decoded unit of an exchange's event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Token(String),
    Status(String),
    Sources(Vec<DocumentSource>),
    Done {
        answer: Option<String>,
        sources: Option<Vec<DocumentSource>>,
    },
}

impl StreamEvent {
    pub fn done() -> Self {
        StreamEvent::Done {
            answer: None,
            sources: None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamEvent::Done { .. })
    }
}
