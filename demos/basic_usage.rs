//! Basic dispatcher usage example
//!
//! Demonstrates console and in-memory sinks, level masks, runtime levels and
//! a custom formatter.
//!
//! Run with: cargo run --example basic_usage

use rust_log_dispatch::prelude::*;
use rust_log_dispatch::{log_debug, log_error, log_info, log_warn};
use std::sync::Arc;

fn main() -> Result<()> {
    println!("=== Rust Log Dispatch - Basic Usage Example ===\n");

    let dispatcher = Dispatcher::builder()
        .source_level("demo", LogLevel::DEBUG)
        .sink(ConsoleSink::new(), LogLevel::ALL)
        .build()?;

    // Errors only, rendered as JSON
    let errors = MemorySink::new("errors").with_formatter(Arc::new(JsonFormatter::new()));
    let error_lines = errors.lines();
    dispatcher.add_sink(errors, LogLevel::ERROR)?;

    let level = dispatcher.levels().register("demo", LogLevel::VERBOSE);

    println!("1. Logging at different flags:");
    log_debug!(dispatcher, level, "This is a debug message");
    log_info!(dispatcher, level, "This is an info message");
    log_warn!(dispatcher, level, "This is a warning message");
    log_error!(dispatcher, level, "This is an error message");
    dispatcher.flush()?;

    println!("\n2. Raising the threshold at runtime:");
    dispatcher.levels().set("demo", LogLevel::WARNING)?;
    log_info!(dispatcher, level, "Info message (hidden)");
    log_warn!(dispatcher, level, "Warning message (visible)");
    dispatcher.flush()?;

    println!("\n3. Registered sinks:");
    for info in dispatcher.list_sinks()? {
        println!("   {} {} on lane '{}' (level {})", info.id, info.name, info.lane, info.level);
    }

    let compact = Arc::new(FnFormatter::new(|record: &LogRecord| {
        Some(format!("{} | {}", record.flag, record.message))
    }));
    let plain = MemorySink::new("plain").with_formatter(compact);
    let plain_lines = plain.lines();
    let handle = dispatcher.add_sink(plain, LogLevel::ALL)?;
    log_warn!(dispatcher, level, "Compact output");
    dispatcher.flush()?;
    dispatcher.remove_sink(&handle)?;

    println!("\n4. Captured output:");
    for line in error_lines.snapshot() {
        println!("   errors sink: {}", line);
    }
    for line in plain_lines.snapshot() {
        println!("   plain sink:  {}", line);
    }

    let metrics = dispatcher.metrics();
    println!(
        "\n   submitted: {}, delivered: {}",
        metrics.submitted(),
        metrics.delivered()
    );

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
