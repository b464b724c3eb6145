//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table, or a warning when there are none
pub fn print_table<T: Tabled>(rows: Vec<T>, empty_message: &str) {
    if rows.is_empty() {
        print_warning(empty_message);
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a section heading with an underline
pub fn print_heading(title: &str, rule: char) {
    println!("{}", title.bold());
    println!("{}", rule.to_string().repeat(50));
}

/// Format a USD amount
pub fn format_currency(amount: f64) -> String {
    format!("${:.2}", amount)
}

/// Render tags as `k=v, k=v`
pub fn format_tags<'a>(tags: impl IntoIterator<Item = (&'a String, &'a String)>) -> String {
    tags.into_iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Shorten long values for table cells
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let kept: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        value.to_string()
    }
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "running" | "available" | "active" => status.green().to_string(),
        "pending" | "starting" | "modifying" | "backing-up" => status.yellow().to_string(),
        "stopped" | "stopping" => status.red().to_string(),
        "terminated" | "deleting" | "failed" => status.red().dimmed().to_string(),
        _ => status.to_string(),
    }
}

/// Color a cost trend label
pub fn color_trend(trend: &str) -> String {
    match trend {
        "increasing" => format!("↑ {}", trend).red().to_string(),
        "decreasing" => format!("↓ {}", trend).green().to_string(),
        _ => format!("→ {}", trend).normal().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(12.345), "$12.35");
        assert_eq!(format_currency(0.0), "$0.00");
    }

    #[test]
    fn test_format_tags() {
        let tags = BTreeMap::from([
            ("Name".to_string(), "web".to_string()),
            ("env".to_string(), "prod".to_string()),
        ]);
        assert_eq!(format_tags(&tags), "Name=web, env=prod");
        assert_eq!(format_tags(&BTreeMap::new()), "");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("arn:aws:lambda:us-east-1:123:function:ingest", 12), "arn:aws:l...");
    }
}
