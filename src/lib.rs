//! # Rust Log Dispatch
//!
//! A logging facade that fans each record out to any number of independently
//! scheduled sinks.
//!
//! ## Features
//!
//! - **Global Ordering**: every sink sees records in submission order
//! - **Independent Sinks**: each sink drains on its own lane, so a slow sink
//!   never holds back the others
//! - **Sync or Async**: submit fire-and-forget or wait for delivery
//! - **Flush Barrier**: wait until everything submitted so far is written
//! - **Runtime Levels**: adjust call-site thresholds while running

pub mod core;
pub mod formatters;
pub mod macros;
pub mod sinks;

pub mod prelude {
    #[cfg(feature = "console")]
    pub use crate::sinks::ConsoleSink;
    #[cfg(feature = "file")]
    pub use crate::sinks::FileSink;
    pub use crate::formatters::{FnFormatter, JsonFormatter, TextFormatter};
    pub use crate::sinks::{MemoryLines, MemorySink};
    pub use crate::core::{
        CopyPolicy, Dispatcher, DispatcherBuilder, DispatcherConfig, DispatcherMetrics,
        DynamicLevel, Formatter, FormatterSlot, Lane, LevelRegistry, LevelThreshold, LogFlag,
        LogLevel, LogRecord, LoggerError, Result, Sink, SinkHandle, SinkId, SinkInfo, Tag,
        TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

pub use self::core::{
    CopyPolicy, Dispatcher, DispatcherBuilder, DispatcherConfig, DispatcherMetrics, DynamicLevel,
    Formatter, FormatterSlot, Lane, LevelRegistry, LevelThreshold, LogFlag, LogLevel, LogRecord,
    LogRecordBuilder, LoggerError, Result, Sink, SinkHandle, SinkId, SinkInfo, Tag,
    TimestampFormat, DEFAULT_SHUTDOWN_TIMEOUT,
};
