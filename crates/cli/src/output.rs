//! Output formatting utilities

use analyzer_lib::{HostStatus, RiskLevel, Thresholds, TrendDirection};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table
pub fn print_rows<T: Tabled>(rows: Vec<T>) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a section heading
pub fn print_heading(title: &str) {
    println!("\n{}", title.bold().underline());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a CPU Ready percentage
pub fn format_percent(value: f64) -> String {
    format!("{:.2}%", value)
}

/// Format a signed change in percentage points
pub fn format_delta(value: f64) -> String {
    format!("{:+.2}%", value)
}

/// Format a duration in seconds as days/hours/minutes
pub fn format_duration(seconds: i64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Color a percentage by the thresholds it crosses
pub fn color_percent(value: f64, thresholds: &Thresholds) -> String {
    color_by_status(&format_percent(value), thresholds.status_for(value))
}

/// Color host status
pub fn color_status(status: HostStatus) -> String {
    color_by_status(&status.to_string(), status)
}

fn color_by_status(text: &str, status: HostStatus) -> String {
    match status {
        HostStatus::Healthy => text.green().to_string(),
        HostStatus::Warning => text.yellow().to_string(),
        HostStatus::Critical => text.red().to_string(),
    }
}

/// Color a 0-100 health score
pub fn color_score(score: f64) -> String {
    let formatted = format!("{:.0}", score);
    if score >= 80.0 {
        formatted.green().to_string()
    } else if score >= 50.0 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

/// Color removal risk
pub fn color_risk(risk: RiskLevel) -> String {
    let label = risk.to_string();
    match risk {
        RiskLevel::Low => label.green().bold().to_string(),
        RiskLevel::Medium => label.yellow().bold().to_string(),
        RiskLevel::High => label.red().bold().to_string(),
    }
}

pub fn color_direction(direction: TrendDirection) -> String {
    let label = direction.to_string();
    match direction {
        TrendDirection::Rising => label.red().to_string(),
        TrendDirection::Falling => label.green().to_string(),
        TrendDirection::Stable => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(90), "1m");
        assert_eq!(format_duration(3 * 3600 + 120), "3h 2m");
        assert_eq!(format_duration(2 * 86_400 + 5 * 3600), "2d 5h");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(3.14159), "3.14%");
        assert_eq!(format_delta(1.5), "+1.50%");
        assert_eq!(format_delta(-0.25), "-0.25%");
    }
}
