/// Global logger configuration
///
/// Held in a process-wide cell so the logging free functions stay
/// zero-argument at call sites. Mutated only through the setters below.

use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

use super::levels::LogLevel;
use super::tags::LogTag;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level that gets printed (errors always pass)
    pub min_level: LogLevel,
    /// Tags with debug logging force-enabled regardless of min_level
    pub debug_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_default()
}

pub fn set_logger_config(config: LoggerConfig) {
    if let Ok(mut current) = LOGGER_CONFIG.write() {
        *current = config;
    }
}

pub fn set_min_level(level: LogLevel) {
    if let Ok(mut current) = LOGGER_CONFIG.write() {
        current.min_level = level;
    }
}

pub fn enable_debug_tag(tag: LogTag) {
    if let Ok(mut current) = LOGGER_CONFIG.write() {
        current.debug_tags.insert(tag.to_debug_key());
    }
}

pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    let config = get_logger_config();
    config.min_level >= LogLevel::Debug || config.debug_tags.contains(&tag.to_debug_key())
}
