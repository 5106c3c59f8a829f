//! JSON-lines formatter

use crate::core::{Formatter, LogRecord, TimestampFormat};
use serde_json::{Map, Value};

/// Renders each record as a single-line JSON object, ready for log shippers
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    timestamp_format: TimestampFormat,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    fn timestamp_value(&self, record: &LogRecord) -> Value {
        match self.timestamp_format {
            TimestampFormat::Unix => Value::from(record.timestamp.timestamp()),
            TimestampFormat::UnixMillis => Value::from(record.timestamp.timestamp_millis()),
            ref other => Value::String(other.format(&record.timestamp)),
        }
    }

    pub fn to_value(&self, record: &LogRecord) -> Value {
        let mut obj = Map::new();
        obj.insert("timestamp".to_string(), self.timestamp_value(record));
        obj.insert("flag".to_string(), Value::from(record.flag.to_str()));
        obj.insert("level".to_string(), Value::from(record.level.to_string()));
        obj.insert("context".to_string(), Value::from(record.context));
        obj.insert("message".to_string(), Value::from(record.message.as_str()));
        obj.insert("thread_id".to_string(), Value::from(record.thread_id_hex()));
        if let Some(ref name) = record.thread_name {
            obj.insert("thread_name".to_string(), Value::from(name.as_str()));
        }
        if !record.file.is_empty() {
            obj.insert("file".to_string(), Value::from(record.file.as_ref()));
            obj.insert("line".to_string(), Value::from(record.line));
        }
        if !record.function.is_empty() {
            obj.insert("function".to_string(), Value::from(record.function_name()));
        }
        if let Some(tag) = record.tag_as::<&'static str>() {
            obj.insert("tag".to_string(), Value::from(*tag));
        } else if let Some(tag) = record.tag_as::<String>() {
            obj.insert("tag".to_string(), Value::from(tag.as_str()));
        }
        Value::Object(obj)
    }
}

impl Formatter for JsonFormatter {
    fn format(&self, record: &LogRecord) -> Option<String> {
        serde_json::to_string(&self.to_value(record)).ok()
    }
}
