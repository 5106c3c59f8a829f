//! Formatter implementations

pub mod closure;
pub mod json;
pub mod text;

pub use closure::FnFormatter;
pub use json::JsonFormatter;
pub use text::TextFormatter;

// Re-export the trait alongside its implementations
pub use crate::core::Formatter;
