//! Status, runlevel and risk color mapping for CLI output.
//!
//! `console` disables styling automatically when stdout is not a terminal
//! or `NO_COLOR` is set.

use console::{style, StyledObject};

/// Returns a styled string for any status value.
///
/// Color scheme:
/// - Green:  completed, approved
/// - Yellow: running
/// - Blue:   pending
/// - Red:    failed, rejected
/// - Dim:    cancelled
pub fn colorize_status(status: &str) -> StyledObject<&str> {
    match status.to_lowercase().as_str() {
        "completed" | "approved" => style(status).green().bold(),
        "running" => style(status).yellow(),
        "pending" => style(status).blue(),
        "failed" | "rejected" => style(status).red().bold(),
        "cancelled" => style(status).dim(),
        _ => style(status),
    }
}

/// Live runs stand out; dry runs are dimmed.
pub fn colorize_runlevel(runlevel: &str) -> StyledObject<&str> {
    match runlevel {
        "live" => style(runlevel).red().bold(),
        "sim" => style(runlevel).yellow(),
        _ => style(runlevel).dim(),
    }
}

pub fn colorize_priority(priority: &str) -> StyledObject<&str> {
    match priority {
        "urgent" => style(priority).red().bold(),
        "high" => style(priority).red(),
        "low" => style(priority).dim(),
        _ => style(priority),
    }
}

/// Styled label for detail views (bold + dimmed colon).
pub fn label(name: &str) -> String {
    format!("{}{}", style(name).bold(), style(":").dim())
}

/// Section header with underline.
pub fn section_header(title: &str) -> String {
    format!("\n{}", style(title).bold().underlined())
}
