//! Structured console logging for the MedFlow facades
//!
//! Provides a clean, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-subsystem tags with individual debug gating
//! - Colored console output
//!
//! ## Usage
//!
//! ```rust
//! use medflow::logger::{self, LogTag};
//!
//! logger::error(LogTag::Db, "Row fetch failed");
//! logger::info(LogTag::Auth, "Signed in");
//! logger::debug(LogTag::Http, "GET /rest/v1/patients"); // gated per tag
//! ```
//!
//! Call `logger::init(LogLevel::Info)` once at startup; everything else is
//! free functions safe to call from any task.

mod config;
mod core;
mod format;
mod levels;
mod tags;

// Re-export public types
pub use config::{enable_debug_tag, get_logger_config, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger with a minimum level threshold
pub fn init(min_level: LogLevel) {
    config::set_min_level(min_level);
}

/// Log at ERROR level (always shown, critical issues)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (important issues)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (detailed diagnostics)
///
/// Only shown when debug is enabled for the tag (see
/// [`enable_debug_tag`]) or the global threshold is Debug or lower.
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (very detailed tracing)
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
