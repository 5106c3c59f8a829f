//! Closure-backed formatter

use crate::core::{Formatter, LogRecord};
use std::fmt;

/// Wraps `Fn(&LogRecord) -> Option<String>` as a [`Formatter`].
///
/// # Example
///
/// ```
/// use rust_log_dispatch::formatters::FnFormatter;
/// use rust_log_dispatch::{Formatter, LogFlag, LogRecord};
///
/// let upper = FnFormatter::new(|record: &LogRecord| Some(record.message.to_uppercase()));
/// let record = LogRecord::builder(LogFlag::INFO, "hi").build();
/// assert_eq!(upper.format(&record).as_deref(), Some("HI"));
/// ```
pub struct FnFormatter<F> {
    func: F,
}

impl<F> FnFormatter<F>
where
    F: Fn(&LogRecord) -> Option<String> + Send + Sync,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Formatter for FnFormatter<F>
where
    F: Fn(&LogRecord) -> Option<String> + Send + Sync,
{
    fn format(&self, record: &LogRecord) -> Option<String> {
        (self.func)(record)
    }
}

impl<F> fmt::Debug for FnFormatter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnFormatter")
    }
}
