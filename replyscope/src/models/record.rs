//! Reply records and the paginated wire envelope

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One reply returned by the remote service
///
/// All wire fields are kept verbatim and in wire order. `message` is the one
/// field the pipeline reads; it is always present and always a string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Name of the free-text field
    pub const MESSAGE_FIELD: &'static str = "message";

    /// Build a record, coercing a missing or non-textual `message` to `""`
    ///
    /// An existing `message` keeps its position; a missing one is appended.
    pub fn from_fields(mut fields: Map<String, Value>) -> Self {
        let textual = matches!(fields.get(Self::MESSAGE_FIELD), Some(Value::String(_)));
        if !textual {
            fields.insert(
                Self::MESSAGE_FIELD.to_string(),
                Value::String(String::new()),
            );
        }
        Self { fields }
    }

    /// Record with only a message, mostly useful for tests and fixtures
    pub fn with_message(message: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(Self::MESSAGE_FIELD.to_string(), Value::String(message.into()));
        Self { fields }
    }

    pub fn message(&self) -> &str {
        self.fields
            .get(Self::MESSAGE_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let fields = Map::<String, Value>::deserialize(deserializer)?;
        Ok(Record::from_fields(fields))
    }
}

/// Response body of one page request
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyEnvelope {
    /// Application status code, 0 on success
    #[serde(alias = "status_code")]
    pub code: i64,

    /// Optional human-readable status from the service
    #[serde(default)]
    pub message: Option<String>,

    #[serde(default)]
    pub data: Option<ReplyPage>,
}

/// One page of replies
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyPage {
    /// Replies on this page, in service order. `null` is treated as empty.
    #[serde(default, alias = "records")]
    pub replies: Option<Vec<Record>>,

    pub cursor: Cursor,
}

impl ReplyPage {
    pub fn into_records(self) -> Vec<Record> {
        self.replies.unwrap_or_default()
    }
}

/// Continuation cursor
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Cursor {
    /// No further pages exist
    pub is_end: bool,
}
