//! Live scan session state machine.
//!
//! Owns the one tracked scan, filters push events by scan id and routes them to
//! the result store or the progress aggregator. Each call returns the effects the
//! dashboard should present; the controller itself performs no I/O.

use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::progress::{ProgressAggregator, ProgressSnapshot};
use crate::store::{DiscoveredItem, ResultStore};
use crate::types::{Completion, ScanEvent, ScanId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Something the presentation layer should do as a result of a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ProgressReset(ScanId),
    ProgressChanged(ProgressSnapshot),
    ResultAppended(DiscoveredItem),
    Notify(NoticeLevel, String),
    InlineError(String),
    RefreshHistory,
    ScheduleSummary { scan_id: ScanId, delay: Duration },
}

/// Result of feeding one event to the controller.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied(Vec<Effect>),
    /// Discovery for a key already in the store.
    Duplicate,
    /// Event for a scan id other than the tracked one.
    Stale,
    /// Event for the tracked id after it reached a terminal state.
    Ignored,
}

impl Outcome {
    pub fn effects(&self) -> &[Effect] {
        match self {
            Outcome::Applied(effects) => effects,
            _ => &[],
        }
    }
}

/// End-of-scan summary shown after completion.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ScanSummary {
    pub scan_id: ScanId,
    pub total_subdomains: u64,
    pub output_file: Option<String>,
    pub top: Vec<String>,
}

/// Everything tied to one scan. Re-created on each start and dropped with it.
#[derive(Debug)]
pub struct ScanSession {
    id: ScanId,
    state: SessionState,
    started_at: OffsetDateTime,
    store: ResultStore,
    progress: ProgressAggregator,
    completion: Option<Completion>,
    error: Option<String>,
}

impl ScanSession {
    fn new(id: ScanId) -> Self {
        Self {
            id,
            state: SessionState::Running,
            started_at: OffsetDateTime::now_utc(),
            store: ResultStore::new(),
            progress: ProgressAggregator::new(),
            completion: None,
            error: None,
        }
    }

    pub fn id(&self) -> &ScanId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn progress(&self) -> &ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Debug)]
pub struct SessionController {
    current: Option<ScanSession>,
    summary_delay: Duration,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl SessionController {
    pub fn new(summary_delay: Duration) -> Self {
        Self {
            current: None,
            summary_delay,
        }
    }

    pub fn state(&self) -> SessionState {
        self.current
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state)
    }

    pub fn current(&self) -> Option<&ScanSession> {
        self.current.as_ref()
    }

    pub fn current_id(&self) -> Option<&ScanId> {
        self.current.as_ref().map(|s| &s.id)
    }

    pub fn is_current(&self, id: &ScanId) -> bool {
        self.current_id() == Some(id)
    }

    /// Adopt a freshly started scan. The previous session, if any, is dropped
    /// and its id no longer routes.
    pub fn begin(&mut self, id: ScanId) -> Vec<Effect> {
        if let Some(prev) = self.current.take() {
            if prev.state == SessionState::Running {
                info!(old = %prev.id, new = %id, "superseding running scan");
            }
        }
        info!(scan_id = %id, "tracking scan");
        self.current = Some(ScanSession::new(id.clone()));
        vec![Effect::ProgressReset(id)]
    }

    pub fn handle(&mut self, event: &ScanEvent) -> Outcome {
        let Some(session) = self.current.as_mut() else {
            debug!(scan_id = %event.scan_id(), kind = event.kind(), "no active scan, dropping event");
            return Outcome::Stale;
        };
        if &session.id != event.scan_id() {
            debug!(scan_id = %event.scan_id(), active = %session.id, kind = event.kind(), "stale event dropped");
            return Outcome::Stale;
        }
        if session.state.is_terminal() {
            debug!(scan_id = %session.id, kind = event.kind(), "scan already finished, ignoring event");
            return Outcome::Ignored;
        }

        match event {
            ScanEvent::Progress(update) => {
                session
                    .progress
                    .apply(update.progress, update.current_tool.as_deref());
                Outcome::Applied(vec![Effect::ProgressChanged(session.progress.snapshot().clone())])
            }
            ScanEvent::Discovery(found) => {
                if !session.store.try_add(&found.subdomain, &found.tool) {
                    debug!(subdomain = %found.subdomain, tool = %found.tool, "duplicate discovery");
                    return Outcome::Duplicate;
                }
                session.progress.on_discovery_accepted();
                let item = match session.store.last() {
                    Some(item) => item.clone(),
                    None => return Outcome::Applied(Vec::new()),
                };
                Outcome::Applied(vec![
                    Effect::ResultAppended(item),
                    Effect::ProgressChanged(session.progress.snapshot().clone()),
                ])
            }
            ScanEvent::Completed(done) => {
                session.state = SessionState::Completed;
                session.progress.complete();
                session.completion = Some(done.clone());
                info!(scan_id = %session.id, total = done.total_subdomains, accepted = session.store.len(), "scan completed");
                Outcome::Applied(vec![
                    Effect::ProgressChanged(session.progress.snapshot().clone()),
                    Effect::Notify(
                        NoticeLevel::Success,
                        format!("Scan completed! Found {} subdomains", done.total_subdomains),
                    ),
                    Effect::RefreshHistory,
                    Effect::ScheduleSummary {
                        scan_id: session.id.clone(),
                        delay: self.summary_delay,
                    },
                ])
            }
            ScanEvent::Failed(failure) => {
                session.state = SessionState::Failed;
                session.error = Some(failure.error.clone());
                warn!(scan_id = %session.id, error = %failure.error, kept = session.store.len(), "scan failed");
                let message = format!("Scan failed: {}", failure.error);
                Outcome::Applied(vec![
                    Effect::Notify(NoticeLevel::Error, message.clone()),
                    Effect::InlineError(message),
                ])
            }
        }
    }

    /// Summary of the tracked scan, available once it has completed.
    pub fn summary(&self, top_n: usize) -> Option<ScanSummary> {
        let session = self.current.as_ref()?;
        let done = session.completion.as_ref()?;
        Some(ScanSummary {
            scan_id: session.id.clone(),
            total_subdomains: done.total_subdomains,
            output_file: done.output_file.clone(),
            top: session.store.top_n(top_n).map(str::to_string).collect(),
        })
    }
}
