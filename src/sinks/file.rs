//! File sink implementation

use crate::core::{Formatter, FormatterSlot, LogRecord, LoggerError, Result, Sink};
use crate::formatters::TextFormatter;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Appends one formatted line per record to a file.
///
/// Output is buffered; [`Sink::flush`] (and therefore
/// [`crate::Dispatcher::flush`]) pushes it to the OS.
pub struct FileSink {
    path: PathBuf,
    name: String,
    writer: Option<BufWriter<File>>,
    formatter: FormatterSlot,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                LoggerError::io_operation("opening log file", path.display().to_string(), e)
            })?;

        Ok(Self {
            name: format!("file:{}", path.display()),
            path,
            writer: Some(BufWriter::new(file)),
            formatter: FormatterSlot::new(Some(Arc::new(TextFormatter::new()))),
        })
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = FormatterSlot::new(Some(formatter));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn process(&mut self, record: &LogRecord) -> Result<()> {
        let Some(line) = self.formatter.format(record) else {
            return Ok(());
        };
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| LoggerError::sink(&self.name, "file already closed"))?;

        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn on_detach(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                eprintln!("[LOGGER ERROR] Failed to flush '{}' on detach: {}", self.name, e);
            }
        }
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

impl Drop for FileSink {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
