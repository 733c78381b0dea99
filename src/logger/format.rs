//! Log formatting and output with ANSI colors
//!
//! Handles:
//! - Colorized console output with tag and level formatting
//! - Broken pipe handling for piped commands

use super::tags::LogTag;
use chrono::Local;
use colored::*;
use std::io::{stdout, ErrorKind, Write};

/// Log format width for tag alignment
const TAG_WIDTH: usize = 9;

/// Format and output a log message
pub fn format_and_log(tag: LogTag, log_type: &str, message: &str) {
    let time = Local::now().format("%H:%M:%S").to_string();

    let tag_str = format_tag(&tag);
    let log_type_str = format_log_type(log_type);

    let line = format!(
        "{} [{}] [{}] {}",
        time.dimmed(),
        tag_str,
        log_type_str,
        message
    );
    print_stdout_safe(&line);
}

/// Format a tag with appropriate color
fn format_tag(tag: &LogTag) -> ColoredString {
    let padded = format!("{:<width$}", tag.label(), width = TAG_WIDTH);
    match tag {
        LogTag::Config => padded.bright_yellow().bold(),
        LogTag::Auth => padded.bright_magenta().bold(),
        LogTag::Db => padded.bright_blue().bold(),
        LogTag::Dashboard => padded.bright_green().bold(),
        LogTag::Realtime => padded.bright_cyan().bold(),
        LogTag::Http => padded.bright_white().bold(),
    }
}

/// Format a log type/level with appropriate color
fn format_log_type(log_type: &str) -> ColoredString {
    match log_type {
        "ERROR" => log_type.bright_red().bold(),
        "WARNING" => log_type.yellow().bold(),
        "INFO" => log_type.normal(),
        "DEBUG" => log_type.dimmed(),
        "VERBOSE" => log_type.dimmed().italic(),
        other => other.normal(),
    }
}

/// Write a line to stdout, swallowing broken pipes (piped output)
fn print_stdout_safe(line: &str) {
    let mut out = stdout();
    if let Err(e) = writeln!(out, "{}", line) {
        if e.kind() != ErrorKind::BrokenPipe {
            eprintln!("{}", line);
        }
    }
}
