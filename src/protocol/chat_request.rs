use serde::{Deserialize, Serialize};

use crate::domain::{Message, MessageRole};

/// Number of prior messages sent as context with each question.
pub const MAX_HISTORY_MESSAGES: usize = 6;

/// Body of `POST /chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default)]
    pub conversation_history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: MessageRole,
    pub content: String,
}

impl ChatRequest {
    pub fn new(question: impl Into<String>, history: &[Message]) -> Self {
        Self {
            question: question.into(),
            conversation_history: history.iter().map(HistoryEntry::from).collect(),
        }
    }

    /// Keeps only the `limit` most recent history entries.
    pub fn bounded(mut self, limit: usize) -> Self {
        let excess = self.conversation_history.len().saturating_sub(limit);
        self.conversation_history.drain(..excess);
        self
    }
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
        }
    }
}
