//! Formatter trait for turning records into output lines

use super::log_record::LogRecord;

/// Renders a record for a sink.
///
/// Returning `None` filters the record out: the owning sink writes nothing for
/// it. One formatter may be shared by several sinks, so `format` can run on
/// several lanes at once.
///
/// # Example
///
/// ```
/// use rust_log_dispatch::{Formatter, LogRecord};
///
/// struct MessageOnly;
///
/// impl Formatter for MessageOnly {
///     fn format(&self, record: &LogRecord) -> Option<String> {
///         Some(record.message.clone())
///     }
/// }
/// ```
pub trait Formatter: Send + Sync {
    fn format(&self, record: &LogRecord) -> Option<String>;

    /// Called on the sink's lane after the formatter is installed on `sink`.
    ///
    /// Formatters that keep per-sink caches can use this pair of hooks to
    /// track how many sinks share them.
    fn did_attach(&self, _sink: &str) {}

    /// Called on the sink's lane before the formatter is removed from `sink`
    fn will_detach(&self, _sink: &str) {}
}
