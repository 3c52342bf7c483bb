//! Pretty-print helpers for CLI output

use crate::cache::{is_fresh, CacheEntry};
use crate::config::Config;
use crate::refresh::{RefreshOutcome, RefreshReport};
use crate::snapshot::DataSnapshot;
use chrono::{Local, TimeZone};
use colored::Colorize;
use std::path::Path;
use std::time::Duration;

/// How many records `scores` lists
pub const TOP_SCORES: usize = 10;

/// Print a main header
pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().cyan());
    println!("{}", "─".repeat(50).dimmed());
}

/// Print a sub-header (section within output)
pub fn print_subheader(title: &str) {
    println!();
    println!("{}", title.bold().white());
}

/// Print a key-value pair
pub fn print_field(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a numbered list item
pub fn print_numbered_item(num: usize, text: &str) {
    println!("  {}. {}", format!("{:>2}", num).dimmed(), text);
}

/// Local time for an epoch-ms timestamp; `0` means never
pub fn format_timestamp(epoch_ms: i64) -> String {
    if epoch_ms <= 0 {
        return "never".to_string();
    }

    match Local.timestamp_millis_opt(epoch_ms).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("{} (invalid)", epoch_ms),
    }
}

/// Rough human age, e.g. "2d 4h"
pub fn format_age(age_ms: i64) -> String {
    let secs = age_ms.max(0) / 1000;
    let (days, hours, mins) = (secs / 86_400, (secs % 86_400) / 3_600, (secs % 3_600) / 60);

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}

/// [`format_age`] for a configured span; spans past `i64::MAX` ms saturate
pub fn format_span(span: Duration) -> String {
    format_age(i64::try_from(span.as_millis()).unwrap_or(i64::MAX))
}

fn outcome_label(outcome: RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Fresh => outcome.as_str().green().to_string(),
        RefreshOutcome::Fetched => outcome.as_str().green().bold().to_string(),
        RefreshOutcome::Cached | RefreshOutcome::Stale => outcome.as_str().yellow().to_string(),
        RefreshOutcome::Empty => outcome.as_str().red().to_string(),
    }
}

fn print_top_records(snapshot: &DataSnapshot, limit: usize) {
    let mut records: Vec<_> = snapshot.attestations.iter().collect();
    records.sort_by(|a, b| b.yap_points.cmp(&a.yap_points));

    print_subheader(&format!("Top {} by yap points", limit.min(records.len())));
    if records.is_empty() {
        println!("  {}", "(none)".dimmed());
        return;
    }

    for (i, record) in records.iter().take(limit).enumerate() {
        print_numbered_item(
            i + 1,
            &format!(
                "@{} {}",
                record.twitter_username.green(),
                format!("{} YAP", record.yap_points).yellow()
            ),
        );
    }
}

/// Display the result of a refresh
pub fn display_snapshot(report: &RefreshReport) {
    print_header("Yap Scores");

    print_field("Source", &outcome_label(report.outcome));
    print_field("Records", &report.snapshot.len().to_string());
    print_field("Exported", &format_timestamp(report.snapshot.timestamp));

    print_top_records(&report.snapshot, TOP_SCORES);
    println!();
}

/// Display a single lookup
pub fn display_lookup(username: &str, points: Option<u64>, outcome: RefreshOutcome) {
    let handle = format!("@{}", username.trim_start_matches('@'));
    match points {
        Some(points) => println!("{} {}", handle.green(), format!("{} YAP", points).yellow().bold()),
        None => println!("{} {}", handle, "has no yap score".dimmed()),
    }

    if outcome != RefreshOutcome::Fresh && outcome != RefreshOutcome::Fetched {
        println!("  {}", format!("(served from {})", outcome.as_str()).dimmed());
    }
}

/// Display cache age and freshness
pub fn display_cache_status(entry: Option<&CacheEntry>, now: i64, window: Duration, path: &Path) {
    print_header("Cache Status");
    print_field("Cache file", &path.display().to_string());

    match entry {
        None => print_field("State", &"empty".red().to_string()),
        Some(entry) => {
            let state = if is_fresh(entry, now, window) {
                "fresh".green()
            } else {
                "stale".yellow()
            };
            print_field("State", &state.to_string());
            print_field("Last updated", &format_timestamp(entry.last_updated));
            print_field("Age", &format_age(entry.age_ms(now)));
            print_field("Records", &entry.snapshot.len().to_string());
            print_field("Exported", &format_timestamp(entry.snapshot.timestamp));
        }
    }

    print_field("Freshness window", &format_span(window));
    println!();
}

/// Display a verified download
pub fn display_verify(name: &str, content_id: &str, snapshot: &DataSnapshot) {
    print_header("Verified Published Snapshot");
    print_field("ENS name", name);
    print_field("Content id", content_id);
    print_field("Records", &snapshot.len().to_string());
    print_field("Exported", &format_timestamp(snapshot.timestamp));
    println!();
}

/// Display the outcome of a publish check
pub fn display_publish_check(
    file: &Path,
    records: usize,
    exported_at: i64,
    current: Option<&str>,
    content_id: &str,
    update_needed: bool,
) {
    print_header("Publish Check");
    print_field("Export", &file.display().to_string());
    print_field("Records", &records.to_string());
    print_field("Exported", &format_timestamp(exported_at));
    print_field("Current record", current.unwrap_or("(unset)"));
    print_field("New content id", content_id);

    println!();
    if update_needed {
        println!("  {}", "Name record needs to be updated.".yellow().bold());
    } else {
        println!(
            "  {}",
            "Name record already points at this content. Skipping update.".green()
        );
    }
    println!();
}

/// Display configuration
pub fn display_config(config: &Config, path: &Path, exists: bool) {
    print_header("yapscope Configuration");
    print_field("Config file", &path.display().to_string());
    print_field("File exists", if exists { "yes" } else { "no (using defaults)" });

    print_subheader("Name record");
    print_field("RPC URL", &config.rpc_url);
    print_field("ENS name", &config.name_record.name);
    print_field("Record key", &config.name_record.key);

    print_subheader("Gateways");
    for (i, gateway) in config.gateways.iter().enumerate() {
        print_numbered_item(i + 1, gateway);
    }

    print_subheader("Timing");
    print_field("Freshness window", &format_span(config.freshness_window()));
    print_field("Fetch timeout", &format!("{}s", config.fetch_timeout_secs));
    print_field("Resolve timeout", &format!("{}s", config.resolve_timeout_secs));
    print_field("Storage timeout", &format!("{}s", config.storage_timeout_secs));
    print_field("Refresh interval", &format_span(config.refresh_interval()));
    println!();
}

/// Display an error message
pub fn display_error(msg: &str) {
    eprintln!("{} {}", "Error:".red().bold(), msg);
}
