//! Human-readable single-line formatter

use crate::core::{Formatter, LogRecord, TimestampFormat};
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Renders `[timestamp] [LEVEL] [thread] file:line function - message`.
///
/// Newlines, carriage returns and tabs in the message are escaped so one
/// record always yields one line and cannot forge additional entries.
#[derive(Debug)]
pub struct TextFormatter {
    timestamp_format: Option<TimestampFormat>,
    include_thread: bool,
    include_location: bool,
    attached_sinks: AtomicUsize,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self {
            timestamp_format: Some(TimestampFormat::default()),
            include_thread: true,
            include_location: true,
            attached_sinks: AtomicUsize::new(0),
        }
    }

    /// Set the timestamp format, or `None` to omit the timestamp
    #[must_use]
    pub fn with_timestamp_format(mut self, format: Option<TimestampFormat>) -> Self {
        self.timestamp_format = format;
        self
    }

    #[must_use]
    pub fn with_thread(mut self, include: bool) -> Self {
        self.include_thread = include;
        self
    }

    #[must_use]
    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    /// Number of sinks this formatter is currently installed on
    pub fn attached_sinks(&self) -> usize {
        self.attached_sinks.load(Ordering::Relaxed)
    }

    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl Formatter for TextFormatter {
    fn format(&self, record: &LogRecord) -> Option<String> {
        let mut out = String::with_capacity(record.message.len() + 64);

        if let Some(ref format) = self.timestamp_format {
            let _ = write!(out, "[{}] ", format.format(&record.timestamp));
        }
        let _ = write!(out, "[{:5}]", record.flag.to_str());
        if self.include_thread {
            let _ = write!(out, " [{}]", record.thread_label());
        }
        if self.include_location && !record.file.is_empty() {
            let _ = write!(out, " {}:{}", record.file_name(), record.line);
            if !record.function.is_empty() {
                let _ = write!(out, " {}", record.function_name());
            }
        }
        let _ = write!(out, " - {}", Self::sanitize_message(&record.message));

        Some(out)
    }

    fn did_attach(&self, _sink: &str) {
        self.attached_sinks.fetch_add(1, Ordering::Relaxed);
    }

    fn will_detach(&self, _sink: &str) {
        self.attached_sinks.fetch_sub(1, Ordering::Relaxed);
    }
}
