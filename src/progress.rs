//! Progress reporting and console summaries
//!
//! Provides real-time progress display using indicatif progress bars.

use crate::scan::{ScanProgress, ScanSummary};
use crate::stats::{AggregateStats, OwnerUsage};
use crate::store::{ErrorRecord, LogRecord};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter that displays scan status
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Handle that can be moved into a progress callback
    pub fn bar(&self) -> ProgressBar {
        self.bar.clone()
    }

    /// Update the progress display
    pub fn update(&self, progress: &ScanProgress) {
        update_bar(&self.bar, progress);
    }

    /// Finish the progress display with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Render one progress sample onto a bar
pub fn update_bar(bar: &ProgressBar, progress: &ScanProgress) {
    let msg = format!(
        "Scanned: {} | Reused: {} | Files: {} | Size: {} | Rate: {:.0} dirs/s | Errors: {} | Workers: {}/{}",
        format_number(progress.scanned),
        format_number(progress.reused),
        format_number(progress.files),
        format_size(progress.bytes, BINARY),
        progress.dirs_per_second(),
        format_number(progress.errors),
        progress.active_workers,
        progress.total_workers,
    );
    bar.set_message(msg);
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

fn format_signed_size(bytes: i64) -> String {
    if bytes < 0 {
        format!("-{}", format_size(bytes.unsigned_abs(), BINARY))
    } else {
        format_size(bytes as u64, BINARY)
    }
}

/// Print a header at the start of the scan
pub fn print_header(root: &str, workers: usize, db: &str, mode: &str) {
    println!();
    println!(
        "{} {}",
        style("du-walker").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Root:").bold(), root);
    println!("  {} {}", style("Workers:").bold(), workers);
    println!("  {} {}", style("Store:").bold(), db);
    println!("  {} {}", style("Mode:").bold(), mode);
    println!();
}

/// Print a summary of the scan results
pub fn print_summary(summary: &ScanSummary, db_path: &str, db_size: Option<u64>) {
    let duration_secs = summary.duration.as_secs_f64();
    let dirs = summary.scanned + summary.reused;
    let rate = if duration_secs > 0.0 {
        dirs as f64 / duration_secs
    } else {
        0.0
    };

    let title = if summary.completed {
        style("Scan Complete").green().bold()
    } else {
        style("Scan Interrupted").yellow().bold()
    };

    println!();
    println!("{}", title);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {} scanned, {} reused",
        style("Directories:").bold(),
        format_number(summary.scanned),
        format_number(summary.reused)
    );
    println!("  {} {}", style("Files:").bold(), format_number(summary.files));
    println!(
        "  {} {}",
        style("Total Size:").bold(),
        format_size(summary.bytes, BINARY)
    );
    if summary.deleted > 0 {
        println!(
            "  {} {}",
            style("Removed:").bold(),
            format_number(summary.deleted)
        );
    }
    if summary.excluded + summary.permission_skipped > 0 {
        println!(
            "  {} {} excluded, {} permission denied",
            style("Skipped:").bold(),
            format_number(summary.excluded),
            format_number(summary.permission_skipped)
        );
    }
    println!(
        "  {} {:.1}s ({:.0} dirs/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    if summary.errors + summary.failed > 0 {
        println!(
            "  {} {} ({} directories failed)",
            style("Errors:").yellow().bold(),
            format_number(summary.errors),
            format_number(summary.failed)
        );
    }
    if summary.decode_failures > 0 {
        println!(
            "  {} {}",
            style("Unreadable records:").yellow().bold(),
            format_number(summary.decode_failures)
        );
    }
    match db_size {
        Some(size) => println!(
            "  {} {} ({})",
            style("Store:").bold(),
            db_path,
            format_size(size, BINARY)
        ),
        None => println!("  {} {}", style("Store:").bold(), db_path),
    }
    println!();
}

/// Print aggregated usage with the top users and groups
pub fn print_usage(stats: &AggregateStats, top: usize) {
    let scope = if stats.prefix.is_empty() {
        "(all)"
    } else {
        stats.prefix.as_str()
    };

    println!();
    println!("{} {}", style("Usage for").green().bold(), scope);
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Directories:").bold(),
        format_number(stats.directories)
    );
    println!("  {} {}", style("Files:").bold(), format_number(stats.totals.files));
    println!(
        "  {} {}",
        style("Size:").bold(),
        format_signed_size(stats.totals.bytes)
    );
    println!(
        "  {} {} ({})",
        style("On disk:").bold(),
        format_signed_size(stats.totals.storage_bytes),
        stats.disk_usage
    );
    if stats.undecodable > 0 {
        println!(
            "  {} {}",
            style("Unreadable records:").yellow().bold(),
            format_number(stats.undecodable)
        );
    }

    print_owner_table("Users", "UID", &stats.top_users(top));
    print_owner_table("Groups", "GID", &stats.top_groups(top));
}

fn print_owner_table(title: &str, id_label: &str, rows: &[OwnerUsage]) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("{}", style(title).bold());
    println!(
        "  {:>10}  {:>14}  {:>12}  {:>12}",
        id_label, "Files", "Size", "On disk"
    );
    for row in rows {
        println!(
            "  {:>10}  {:>14}  {:>12}  {:>12}",
            row.id,
            format_number(row.usage.files),
            format_signed_size(row.usage.bytes),
            format_signed_size(row.usage.storage_bytes)
        );
    }
}

pub fn print_log(log: &LogRecord) {
    println!(
        "{}  {}  {}",
        style(log.start.to_rfc3339()).cyan(),
        style(format!("{:.1}s", log.duration().num_milliseconds() as f64 / 1000.0)).dim(),
        log.summary
    );
}

pub fn print_error(error: &ErrorRecord) {
    println!(
        "{}  {}  {}",
        style(error.time.to_rfc3339()).cyan(),
        style(&error.path).bold(),
        error.detail
    );
}
