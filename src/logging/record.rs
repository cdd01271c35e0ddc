//! Log records and structured fields
//!
//! A record is built once per call on the producing thread, encoded to a
//! single NDJSON line and handed to a stream's writer as raw bytes.

use super::level::Level;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::error::Error as StdError;
use std::fmt;

/// Key under which application fields are nested
pub const CONTEXT_KEY: &str = "context";

/// Key carrying a captured call stack
pub const STACKTRACE_KEY: &str = "stacktrace";

/// Message of the synthetic record reporting dropped records
pub const MISSED_MESSAGE: &str = "log_miss";

/// Top-level keys owned by the record itself
const RESERVED_KEYS: [&str; 4] = ["time", "level", "trace_id", "message"];

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A single structured field value
pub enum FieldValue {
    Value(Value),
    /// Rendered to its display string during normalization
    Error(BoxError),
}

impl FieldValue {
    fn normalize(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::Error(err) => Value::String(err.to_string()),
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => write!(f, "{}", value),
            Self::Error(err) => write!(f, "Error({})", err),
        }
    }
}

/// Ordered structured fields attached to a log call
///
/// # Example
///
/// ```
/// use readbook::logging::Fields;
///
/// let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
/// let fields = Fields::new()
///     .with("user_id", 42)
///     .with_error("error", io_err);
/// assert_eq!(fields.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_error(mut self, key: impl Into<String>, err: impl Into<BoxError>) -> Self {
        self.insert_error(key, err);
        self
    }

    /// Insert a value, replacing any earlier value under the same key
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.put(key.into(), FieldValue::Value(value.into()));
    }

    pub fn insert_error(&mut self, key: impl Into<String>, err: impl Into<BoxError>) {
        self.put(key.into(), FieldValue::Error(err.into()));
    }

    fn put(&mut self, key: String, value: FieldValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render every value to plain JSON, errors becoming their display string.
    ///
    /// Returns `None` for an empty set so callers skip the wrapper object.
    pub fn normalize(self) -> Option<Map<String, Value>> {
        if self.entries.is_empty() {
            return None;
        }

        let mut map = Map::with_capacity(self.entries.len());
        for (key, value) in self.entries {
            map.insert(key, value.normalize());
        }
        Some(map)
    }
}

impl<K, V> FromIterator<(K, V)> for Fields
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}

/// One immutable log line
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    #[serde(rename = "time", serialize_with = "serialize_rfc3339")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    pub trace_id: String,
    /// Always present on application records, absent on access records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl LogRecord {
    /// Application record: caller fields nested under `context`
    pub fn application(
        level: Level,
        trace_id: impl Into<String>,
        message: impl Into<String>,
        fields: Fields,
    ) -> Self {
        let mut wrapped = Map::new();
        if let Some(context) = fields.normalize() {
            wrapped.insert(CONTEXT_KEY.to_string(), Value::Object(context));
        }

        Self {
            timestamp: Utc::now(),
            level: Some(level),
            trace_id: trace_id.into(),
            message: Some(message.into()),
            fields: wrapped,
        }
    }

    /// Access record: caller fields merged at the top level, no level
    pub fn access(trace_id: impl Into<String>, fields: Fields) -> Self {
        let mut flat = Map::new();
        for (key, value) in fields.normalize().unwrap_or_default() {
            if RESERVED_KEYS.contains(&key.as_str()) {
                flat.insert(format!("fields.{}", key), value);
            } else {
                flat.insert(key, value);
            }
        }

        Self {
            timestamp: Utc::now(),
            level: None,
            trace_id: trace_id.into(),
            message: None,
            fields: flat,
        }
    }

    /// Synthetic report of `count` records dropped by `stream`
    pub fn missed(stream: &str, count: u64) -> Self {
        Self::application(
            Level::Warn,
            "",
            MISSED_MESSAGE,
            Fields::new().with("count", count).with("stream", stream),
        )
    }

    /// Encode as one newline-terminated JSON line
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

fn serialize_rfc3339<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn decode(record: &LogRecord) -> Value {
        let line = record.encode().unwrap();
        assert_eq!(line.last(), Some(&b'\n'));
        serde_json::from_slice(&line).unwrap()
    }

    #[test]
    fn test_error_field_rendered_as_display_string() {
        let err = io::Error::new(io::ErrorKind::NotFound, "book 7 not found");
        let fields = Fields::new().with("book_id", 7).with_error("error", err);

        let record = LogRecord::application(Level::Error, "t-1", "lookup failed", fields);
        let json = decode(&record);

        assert_eq!(json["context"]["error"], "book 7 not found");
        assert_eq!(json["context"]["book_id"], 7);
    }

    #[test]
    fn test_anyhow_error_field() {
        let err = anyhow::anyhow!("connection reset");
        let record = LogRecord::application(
            Level::Warn,
            "",
            "retrying",
            Fields::new().with_error("error", err),
        );

        assert_eq!(decode(&record)["context"]["error"], "connection reset");
    }

    #[test]
    fn test_empty_fields_have_no_context_key() {
        let record = LogRecord::application(Level::Info, "t-2", "hello", Fields::new());
        let json = decode(&record);

        assert!(json.get(CONTEXT_KEY).is_none());
        assert_eq!(json["message"], "hello");
        assert_eq!(json["level"], "info");
        assert_eq!(json["trace_id"], "t-2");
        assert!(json["time"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_empty_message_is_still_written() {
        let json = decode(&LogRecord::application(Level::Info, "t-5", "", Fields::new()));

        assert_eq!(json["message"], "");
        assert_eq!(json["level"], "info");
    }

    #[test]
    fn test_normalize_empty_short_circuits() {
        assert!(Fields::new().normalize().is_none());
    }

    #[test]
    fn test_insert_replaces_existing_key() {
        let fields = Fields::new().with("a", 1).with("b", 2).with("a", 3);
        let map = fields.normalize().unwrap();

        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], 3);
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_access_record_is_flat_without_level_or_message() {
        let fields: Fields = [("status", 200)].into_iter().collect();
        let record = LogRecord::access("t-3", fields);
        let json = decode(&record);

        assert_eq!(json["status"], 200);
        assert_eq!(json["trace_id"], "t-3");
        assert!(json.get("level").is_none());
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_access_record_renames_reserved_keys() {
        let fields = Fields::new().with("message", "x").with("path", "/books");
        let json = decode(&LogRecord::access("t-4", fields));

        assert_eq!(json["fields.message"], "x");
        assert_eq!(json["path"], "/books");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_missed_record() {
        let json = decode(&LogRecord::missed("access", 12));

        assert_eq!(json["message"], MISSED_MESSAGE);
        assert_eq!(json["context"]["count"], 12);
        assert_eq!(json["context"]["stream"], "access");
    }
}
