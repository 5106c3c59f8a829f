//! In-memory sink, mainly for tests and debug consoles

use crate::core::{Formatter, FormatterSlot, LogRecord, Result, Sink};
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared view of the lines a [`MemorySink`] has written
#[derive(Debug, Clone, Default)]
pub struct MemoryLines(Arc<Mutex<Vec<String>>>);

impl MemoryLines {
    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }
}

/// Keeps formatted lines (and optionally the raw records) in memory.
///
/// Without a formatter the bare message is stored.
pub struct MemorySink {
    name: String,
    lines: MemoryLines,
    records: Arc<Mutex<Vec<LogRecord>>>,
    keep_records: bool,
    formatter: FormatterSlot,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lines: MemoryLines::default(),
            records: Arc::new(Mutex::new(Vec::new())),
            keep_records: true,
            formatter: FormatterSlot::default(),
        }
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = FormatterSlot::new(Some(formatter));
        self
    }

    /// Stop keeping copies of every processed record
    #[must_use]
    pub fn without_records(mut self) -> Self {
        self.keep_records = false;
        self
    }

    pub fn lines(&self) -> MemoryLines {
        self.lines.clone()
    }

    /// Every record passed to `process`, including ones the formatter dropped
    pub fn records(&self) -> Arc<Mutex<Vec<LogRecord>>> {
        Arc::clone(&self.records)
    }
}

impl Sink for MemorySink {
    fn process(&mut self, record: &LogRecord) -> Result<()> {
        if self.keep_records {
            self.records.lock().push(record.clone());
        }
        if let Some(line) = self.formatter.format(record) {
            self.lines.0.lock().push(line);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        self.formatter.get()
    }

    fn set_formatter(&mut self, formatter: Option<Arc<dyn Formatter>>) {
        self.formatter.set(formatter, &self.name);
    }
}
