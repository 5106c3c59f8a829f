//! Call-site logging macros.
//!
//! Each macro tests the flag against a threshold first and only then formats
//! the message and builds a record, so suppressed levels cost one comparison.
//! The threshold is anything implementing [`crate::LevelThreshold`]: a fixed
//! [`crate::LogLevel`] or a [`crate::DynamicLevel`] taken from the dispatcher's
//! level registry. The module path is recorded as the function name.
//!
//! Errors are submitted synchronously, every other flag asynchronously.
//!
//! # Examples
//!
//! ```
//! use rust_log_dispatch::prelude::*;
//! use rust_log_dispatch::{log_info, log_debug};
//!
//! let dispatcher = Dispatcher::new().unwrap();
//! let level = dispatcher.levels().register(module_path!(), LogLevel::INFO);
//!
//! let port = 8080;
//! log_info!(dispatcher, level, "listening on port {}", port);
//! log_debug!(dispatcher, level, "not built: threshold is INFO");
//! ```

/// Log with an explicit flag.
///
/// ```
/// # use rust_log_dispatch::prelude::*;
/// use rust_log_dispatch::log_at;
/// # let dispatcher = Dispatcher::new().unwrap();
/// log_at!(dispatcher, LogLevel::ALL, LogFlag::custom(8), "audit: {}", "login");
/// ```
#[macro_export]
macro_rules! log_at {
    ($dispatcher:expr, $threshold:expr, $flag:expr, $($arg:tt)+) => {{
        let flag: $crate::LogFlag = $flag;
        let threshold = &$threshold;
        if $crate::LevelThreshold::allows(threshold, flag) {
            $dispatcher.log(
                flag == $crate::LogFlag::ERROR,
                $crate::LevelThreshold::threshold(threshold),
                flag,
                0,
                file!(),
                module_path!(),
                line!(),
                None,
                format_args!($($arg)+),
            );
        }
    }};
}

/// Log an error; waits until every matching sink has processed it.
#[macro_export]
macro_rules! log_error {
    ($dispatcher:expr, $threshold:expr, $($arg:tt)+) => {
        $crate::log_at!($dispatcher, $threshold, $crate::LogFlag::ERROR, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($dispatcher:expr, $threshold:expr, $($arg:tt)+) => {
        $crate::log_at!($dispatcher, $threshold, $crate::LogFlag::WARNING, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_info {
    ($dispatcher:expr, $threshold:expr, $($arg:tt)+) => {
        $crate::log_at!($dispatcher, $threshold, $crate::LogFlag::INFO, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($dispatcher:expr, $threshold:expr, $($arg:tt)+) => {
        $crate::log_at!($dispatcher, $threshold, $crate::LogFlag::DEBUG, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_verbose {
    ($dispatcher:expr, $threshold:expr, $($arg:tt)+) => {
        $crate::log_at!($dispatcher, $threshold, $crate::LogFlag::VERBOSE, $($arg)+)
    };
}
