use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque scan identifier handed out by the backend when a scan starts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct ScanId(String);

impl ScanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used in headers and summaries.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Artifact format the backend writes once a scan finishes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
    Csv,
    Html,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Html => "html",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /api/scan`. Exactly one of `target` / `target_list` is set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StartScanBody {
    pub target: Option<String>,
    pub target_list: Option<String>,
    pub output_format: OutputFormat,
    pub filename: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ScanStarted {
    pub scan_id: ScanId,
    #[serde(default)]
    pub message: Option<String>,
}

/// Backend view of one scan, as returned by `GET /api/scan/{id}`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanDetail {
    #[serde(default)]
    pub id: Option<ScanId>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub total_subdomains: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Tool name to installed flag.
pub type ToolStatus = BTreeMap<String, bool>;

/// One stored result artifact from `GET /api/results`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub filename: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub total: Option<u64>,
}

/// Aggregate counters shown above the history list.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistorySummary {
    pub total_scans: usize,
    pub total_subdomains: u64,
}

impl HistorySummary {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        Self {
            total_scans: entries.len(),
            total_subdomains: entries.iter().map(|e| e.total.unwrap_or(0)).sum(),
        }
    }
}

/// `scan_update` push payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub scan_id: ScanId,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_tool: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// `new_result` push payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    pub scan_id: ScanId,
    pub subdomain: String,
    pub tool: String,
}

/// `scan_complete` push payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub scan_id: ScanId,
    #[serde(default)]
    pub total_subdomains: u64,
    #[serde(default)]
    pub output_file: Option<String>,
}

/// `scan_error` push payload.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub scan_id: ScanId,
    pub error: String,
}

/// A decoded push event. Every variant is scoped by its scan id.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Progress(ProgressUpdate),
    Discovery(Discovery),
    Completed(Completion),
    Failed(ScanFailure),
}

impl ScanEvent {
    pub fn scan_id(&self) -> &ScanId {
        match self {
            ScanEvent::Progress(e) => &e.scan_id,
            ScanEvent::Discovery(e) => &e.scan_id,
            ScanEvent::Completed(e) => &e.scan_id,
            ScanEvent::Failed(e) => &e.scan_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ScanEvent::Progress(_) => "progress",
            ScanEvent::Discovery(_) => "discovery",
            ScanEvent::Completed(_) => "completion",
            ScanEvent::Failed(_) => "error",
        }
    }
}
