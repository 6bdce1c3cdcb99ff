use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DocumentSource, MessageId, MessageRole};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: MessageRole,
    pub content: String,
    #[serde(with = "timestamp_format")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<DocumentSource>>,
    #[serde(default)]
    pub streaming: bool,
    /// Marks the dismissable assistant message used to report a failed exchange.
    #[serde(default)]
    pub is_error: bool,
}

impl Message {
    pub fn new(role: MessageRole, content: String) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content,
            timestamp: Utc::now(),
            sources: None,
            streaming: false,
            is_error: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into())
    }

    /// Empty assistant message that receives the streamed answer.
    pub fn assistant_placeholder() -> Self {
        Self {
            streaming: true,
            ..Self::new(MessageRole::Assistant, String::new())
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::new(MessageRole::Assistant, content.into())
        }
    }
}

/// Timestamps are written as RFC 3339 and read back from RFC 3339 strings or
/// epoch milliseconds.
mod timestamp_format {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StoredTimestamp {
        Text(String),
        EpochMillis(i64),
        EpochFloat(f64),
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StoredTimestamp::deserialize(deserializer)? {
            StoredTimestamp::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(de::Error::custom),
            StoredTimestamp::EpochMillis(millis) => Utc
                .timestamp_millis_opt(millis)
                .single()
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", millis))),
            StoredTimestamp::EpochFloat(millis) => Utc
                .timestamp_millis_opt(millis as i64)
                .single()
                .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {}", millis))),
        }
    }
}
