//! Core dispatch types and traits

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod formatter;
pub mod lane;
pub mod level_registry;
pub mod log_level;
pub mod log_record;
pub mod metrics;
pub mod sink;
pub mod timestamp;

pub use config::DispatcherConfig;
pub use dispatcher::{Dispatcher, DispatcherBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use error::{LoggerError, Result};
pub use formatter::Formatter;
pub use lane::Lane;
pub use level_registry::{DynamicLevel, LevelRegistry, LevelThreshold};
pub use log_level::{LogFlag, LogLevel};
pub use log_record::{CopyPolicy, LogRecord, LogRecordBuilder, Tag};
pub use metrics::DispatcherMetrics;
pub use sink::{FormatterSlot, Sink, SinkHandle, SinkId, SinkInfo};
pub use timestamp::TimestampFormat;
