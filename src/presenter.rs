//! Presentation seam. The dashboard pushes every observable change through a
//! `Presenter`; the console implementation prints it.

use std::fmt;

use crate::progress::ProgressSnapshot;
use crate::session::{NoticeLevel, ScanSummary};
use crate::store::DiscoveredItem;
use crate::types::{HistoryEntry, HistorySummary, ScanId, ToolStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl From<bool> for ConnectionStatus {
    fn from(connected: bool) -> Self {
        if connected {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connected => f.write_str("Connected"),
            ConnectionStatus::Disconnected => f.write_str("Disconnected"),
        }
    }
}

pub trait Presenter {
    fn notify(&mut self, level: NoticeLevel, message: &str);
    fn connection_status(&mut self, status: ConnectionStatus);
    fn start_control(&mut self, enabled: bool);
    fn progress_reset(&mut self, scan_id: &ScanId);
    fn progress(&mut self, snapshot: &ProgressSnapshot);
    fn result_row(&mut self, item: &DiscoveredItem);
    fn inline_error(&mut self, message: &str);
    fn summary(&mut self, summary: &ScanSummary);
    fn summary_dismissed(&mut self);
    fn history(&mut self, entries: &[HistoryEntry], totals: &HistorySummary);
    fn tool_status(&mut self, tools: &ToolStatus);
}

/// Human-readable byte size, e.g. `1.5 KB`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}

/// Prints to stdout. Progress lines are only emitted when the rounded percent
/// or the stage label changes.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    last_progress: Option<(i64, String)>,
}

impl ConsolePresenter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Presenter for ConsolePresenter {
    fn notify(&mut self, level: NoticeLevel, message: &str) {
        let tag = match level {
            NoticeLevel::Success => "[ OK ]",
            NoticeLevel::Error => "[FAIL]",
        };
        println!("{tag} {message}");
    }

    fn connection_status(&mut self, status: ConnectionStatus) {
        println!("Server: {status}");
    }

    fn start_control(&mut self, enabled: bool) {
        if !enabled {
            println!("Starting...");
        }
    }

    fn progress_reset(&mut self, scan_id: &ScanId) {
        self.last_progress = None;
        println!("\nScan in progress (ID: {}...)", scan_id.short());
        println!("{:<48}  {:<14}  {:<8}", "subdomain", "tool", "time");
        println!("{:-<48}  {:-<14}  {:-<8}", "", "", "");
    }

    fn progress(&mut self, snapshot: &ProgressSnapshot) {
        let key = (snapshot.percent.round() as i64, snapshot.current_stage.clone());
        if self.last_progress.as_ref() == Some(&key) {
            return;
        }
        println!(
            "  .. {:>4}  {}  (subdomains found: {})",
            snapshot.percent_label(),
            snapshot.current_stage,
            snapshot.item_count
        );
        self.last_progress = Some(key);
    }

    fn result_row(&mut self, item: &DiscoveredItem) {
        let time = format!(
            "{:02}:{:02}:{:02}",
            item.observed_at.hour(),
            item.observed_at.minute(),
            item.observed_at.second()
        );
        println!("{:<48}  {:<14}  {:<8}", item.key, item.tool, time);
    }

    fn inline_error(&mut self, message: &str) {
        eprintln!("  !! {message}");
    }

    fn summary(&mut self, summary: &ScanSummary) {
        println!("\nScan Summary");
        println!("  Scan ID          : {}...", summary.scan_id.short());
        println!("  Total subdomains : {}", summary.total_subdomains);
        println!(
            "  Output file      : {}",
            summary.output_file.as_deref().unwrap_or("N/A")
        );
        println!("  Status           : Completed");
        if !summary.top.is_empty() {
            println!("  Top subdomains found:");
            for sub in &summary.top {
                println!("    - {sub}");
            }
        }
    }

    fn summary_dismissed(&mut self) {}

    fn history(&mut self, entries: &[HistoryEntry], totals: &HistorySummary) {
        println!(
            "\nRecent scans: {} (subdomains: {})",
            totals.total_scans, totals.total_subdomains
        );
        if entries.is_empty() {
            println!("  No recent scans found");
            return;
        }
        let name_w = entries
            .iter()
            .map(|e| e.filename.len())
            .max()
            .unwrap_or(0)
            .max("filename".len());
        println!(
            "{:<name_w$}  {:>10}  {:<19}",
            "filename",
            "size",
            "created",
            name_w = name_w
        );
        println!("{:-<name_w$}  {:-<10}  {:-<19}", "", "", "", name_w = name_w);
        for e in entries {
            let created: String = e.created.chars().take(19).collect();
            println!(
                "{:<name_w$}  {:>10}  {:<19}",
                e.filename,
                format_file_size(e.size),
                created,
                name_w = name_w
            );
        }
    }

    fn tool_status(&mut self, tools: &ToolStatus) {
        println!("\nTools:");
        for (tool, installed) in tools {
            let state = if *installed { "Installed" } else { "Missing" };
            println!("  {:<14} {}", tool, state);
        }
    }
}
