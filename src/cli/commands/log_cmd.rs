//! `passvault log`: display the commit history of a vault.
//!
//! Usage:
//!   passvault log               # show last 50 entries
//!   passvault log --last 20     # show last 20
//!   passvault log --since 7d    # entries from last 7 days

use chrono::{DateTime, Utc};

use crate::cli::Cli;
use crate::errors::{Result, VaultError};

/// Execute the `log` command.
#[cfg(feature = "history-log")]
pub fn execute(cli: &Cli, last: usize, since: Option<&str>) -> Result<()> {
    use crate::cli::{archive_path, output, vault_exists};
    use crate::history::AuditLog;

    let path = archive_path(cli)?;
    if !vault_exists(&path) {
        return Err(VaultError::VaultNotFound(path));
    }

    let path = std::fs::canonicalize(&path)?;
    let log = AuditLog::open(&path)
        .ok_or_else(|| VaultError::History("failed to open history database".into()))?;

    let since_dt = since.map(parse_duration).transpose()?;
    let entries = log.query(last, since_dt)?;

    if entries.is_empty() {
        output::info("No history entries found.");
        return Ok(());
    }

    print_history_table(&entries);
    Ok(())
}

/// Without the history log compiled in there is nothing to show.
#[cfg(not(feature = "history-log"))]
pub fn execute(_cli: &Cli, _last: usize, _since: Option<&str>) -> Result<()> {
    Err(VaultError::CommandFailed(
        "history support is not enabled in this build".into(),
    ))
}

/// Parse a human-friendly duration string like "7d", "24h", "30m".
#[cfg_attr(not(feature = "history-log"), allow(dead_code))]
fn parse_duration(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();

    let (num_str, unit) = if let Some(s) = input.strip_suffix('d') {
        (s, 'd')
    } else if let Some(s) = input.strip_suffix('h') {
        (s, 'h')
    } else if let Some(s) = input.strip_suffix('m') {
        (s, 'm')
    } else {
        return Err(VaultError::CommandFailed(format!(
            "invalid duration '{input}', use format like 7d, 24h, or 30m"
        )));
    };

    let num: i64 = num_str.parse().map_err(|_| {
        VaultError::CommandFailed(format!("invalid duration '{input}', number part is not valid"))
    })?;

    let duration = match unit {
        'd' => chrono::Duration::days(num),
        'h' => chrono::Duration::hours(num),
        _ => chrono::Duration::minutes(num),
    };

    Ok(Utc::now() - duration)
}

/// Print history entries in a formatted table.
#[cfg(feature = "history-log")]
fn print_history_table(entries: &[crate::history::HistoryEntry]) {
    use comfy_table::{ContentArrangement, Table};
    use console::style;

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Time", "Summary", "Archive SHA-256"]);

    for entry in entries {
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            colorize_summary(&entry.summary),
            entry.digest.chars().take(12).collect::<String>(),
        ]);
    }

    println!("{}", style(format!("{} history entries:", entries.len())).bold());
    println!("{table}");
}

/// Colorize a summary by the verb it starts with.
#[cfg(feature = "history-log")]
fn colorize_summary(summary: &str) -> String {
    use console::style;

    match summary.split_whitespace().next() {
        Some("add") => style(summary).green().to_string(),
        Some("update") => style(summary).blue().to_string(),
        Some("remove") => style(summary).red().to_string(),
        _ => summary.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_units() {
        let days = Utc::now() - parse_duration("7d").unwrap();
        assert!((days.num_days() - 7).abs() <= 1);

        let hours = Utc::now() - parse_duration("24h").unwrap();
        assert!((hours.num_hours() - 24).abs() <= 1);

        let minutes = Utc::now() - parse_duration(" 30m ").unwrap();
        assert!((minutes.num_minutes() - 30).abs() <= 1);
    }

    #[test]
    fn parse_duration_invalid() {
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("7x").is_err());
        assert!(parse_duration("d").is_err());
    }

    #[cfg(feature = "history-log")]
    #[test]
    fn colorize_summary_keeps_text() {
        console::set_colors_enabled(false);
        assert_eq!(colorize_summary("add email/personal"), "add email/personal");
        assert_eq!(colorize_summary("init"), "init");
    }
}
