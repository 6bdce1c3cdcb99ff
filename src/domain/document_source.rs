use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A citation attached to an assistant answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Relevance in `[0, 1]`.
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DocumentSource {
    pub fn new(title: impl Into<String>, content: impl Into<String>, score: f32) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            score,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
