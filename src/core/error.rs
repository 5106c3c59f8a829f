//! Error types for the dispatch system

pub type Result<T> = std::result::Result<T, LoggerError>;

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Dispatcher already shut down
    #[error("Dispatcher already stopped")]
    DispatcherStopped,

    /// Lane worker is gone
    #[error("Lane '{lane}' is no longer running")]
    LaneClosed { lane: String },

    /// A blocking round-trip was requested from the lane that would have to answer it
    #[error("Operation '{operation}' would block lane '{lane}' on itself")]
    LaneReentrancy { lane: String, operation: String },

    /// Waiting on a lane exceeded the allowed time
    #[error("Timed out after {millis}ms waiting for {operation}")]
    Timeout { operation: String, millis: u128 },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Source identity was never registered with the level registry
    #[error("No dynamic log level registered for '{0}'")]
    UnknownSource(String),

    /// Failure reported by a sink
    #[error("Sink '{sink}' failed: {message}")]
    SinkError { sink: String, message: String },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    pub fn lane_closed(lane: impl Into<String>) -> Self {
        LoggerError::LaneClosed { lane: lane.into() }
    }

    pub fn reentrancy(lane: impl Into<String>, operation: impl Into<String>) -> Self {
        LoggerError::LaneReentrancy {
            lane: lane.into(),
            operation: operation.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, after: std::time::Duration) -> Self {
        LoggerError::Timeout {
            operation: operation.into(),
            millis: after.as_millis(),
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a sink error
    pub fn sink(sink: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::SinkError {
            sink: sink.into(),
            message: message.into(),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }
}
