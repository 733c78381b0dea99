/// Core logging implementation with automatic filtering
///
/// Decides whether a message should be displayed based on level and tag,
/// then delegates to the format module for output.

use super::config::{get_logger_config, is_debug_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

/// Check if a log message should be displayed
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Debug level requires debug mode for that specific tag (or a global
///    Debug/Verbose threshold)
/// 3. Verbose requires a Verbose threshold
/// 4. Everything else passes the minimum level check
pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    let config = get_logger_config();

    // Rule 1: errors always log
    if level == LogLevel::Error {
        return true;
    }

    // Rule 2: per-tag debug gating
    if level == LogLevel::Debug {
        return is_debug_enabled_for_tag(tag);
    }

    // Rule 3: verbose needs the explicit threshold
    if level == LogLevel::Verbose {
        return config.min_level == LogLevel::Verbose;
    }

    // Rule 4: threshold check
    level <= config.min_level
}

/// Internal logging function with automatic filtering
pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(tag, level.as_str(), message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::config::{set_logger_config, LoggerConfig};
    use std::collections::HashSet;

    // Single test because the logger config is process-wide
    #[test]
    fn test_filtering_rules() {
        set_logger_config(LoggerConfig {
            min_level: LogLevel::Error,
            debug_tags: HashSet::new(),
        });
        assert!(should_log(&LogTag::Db, LogLevel::Error));
        assert!(!should_log(&LogTag::Db, LogLevel::Info));

        let mut debug_tags = HashSet::new();
        debug_tags.insert("auth".to_string());
        set_logger_config(LoggerConfig {
            min_level: LogLevel::Info,
            debug_tags,
        });
        assert!(should_log(&LogTag::Auth, LogLevel::Debug));
        assert!(!should_log(&LogTag::Db, LogLevel::Debug));
        assert!(!should_log(&LogTag::Auth, LogLevel::Verbose));

        set_logger_config(LoggerConfig::default());
    }
}
