//! Console sink implementation

use crate::core::{Formatter, FormatterSlot, LogFlag, LogRecord, Result, Sink};
use crate::formatters::TextFormatter;
use colored::{Color, Colorize};
use std::io::Write;
use std::sync::Arc;

/// Writes formatted records to stdout, or stderr for errors, colored by flag
pub struct ConsoleSink {
    use_colors: bool,
    formatter: FormatterSlot,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            formatter: FormatterSlot::new(Some(Arc::new(TextFormatter::new()))),
        }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self {
            use_colors,
            ..Self::new()
        }
    }

    /// Install a formatter before the sink is registered
    ///
    /// # Example
    ///
    /// ```
    /// use rust_log_dispatch::sinks::ConsoleSink;
    /// use rust_log_dispatch::formatters::JsonFormatter;
    /// use std::sync::Arc;
    ///
    /// let sink = ConsoleSink::new().with_formatter(Arc::new(JsonFormatter::new()));
    /// ```
    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = FormatterSlot::new(Some(formatter));
        self
    }

    fn color_for(flag: LogFlag) -> Color {
        match flag {
            LogFlag::ERROR => Color::Red,
            LogFlag::WARNING => Color::Yellow,
            LogFlag::INFO => Color::Green,
            LogFlag::DEBUG => Color::Blue,
            _ => Color::BrightBlack,
        }
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for ConsoleSink {
    fn process(&mut self, record: &LogRecord) -> Result<()> {
        let Some(output) = self.formatter.format(record) else {
            return Ok(());
        };
        let output = if self.use_colors {
            output.color(Self::color_for(record.flag)).to_string()
        } else {
            output
        };

        // Errors go to stderr, everything else to stdout
        if record.flag == LogFlag::ERROR {
            writeln!(std::io::stderr().lock(), "{}", output)?;
        } else {
            writeln!(std::io::stdout().lock(), "{}", output)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }

    fn formatter(&self) -> Option<Arc<dyn Formatter>> {
        self.formatter.get()
    }

    fn set_formatter(&mut self, formatter: Option<Arc<dyn Formatter>>) {
        self.formatter.set(formatter, "console");
    }
}
