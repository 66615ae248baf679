use serde::Serialize;

pub const STAGE_INITIAL: &str = "Initializing...";
pub const STAGE_FALLBACK: &str = "Processing...";
pub const STAGE_COMPLETED: &str = "Scan completed";

/// What the progress panel displays.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub percent: f64,
    pub current_stage: String,
    pub item_count: u64,
}

impl ProgressSnapshot {
    pub fn percent_label(&self) -> String {
        format!("{}%", self.percent.round() as i64)
    }
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            percent: 0.0,
            current_stage: STAGE_INITIAL.to_string(),
            item_count: 0,
        }
    }
}

/// Derives the progress panel from the event stream.
///
/// Updates are last-write-wins. The backend may resend an equal or lower
/// percentage and the display follows it; nothing is clamped here.
#[derive(Debug, Clone, Default)]
pub struct ProgressAggregator {
    snapshot: ProgressSnapshot,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, percent: f64, stage: Option<&str>) {
        self.snapshot.percent = percent;
        self.snapshot.current_stage = match stage {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => STAGE_FALLBACK.to_string(),
        };
    }

    /// Called once per accepted (non-duplicate) discovery.
    pub fn on_discovery_accepted(&mut self) {
        self.snapshot.item_count += 1;
    }

    /// Freeze the panel at 100% regardless of the last update seen.
    pub fn complete(&mut self) {
        self.snapshot.percent = 100.0;
        self.snapshot.current_stage = STAGE_COMPLETED.to_string();
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }
}
