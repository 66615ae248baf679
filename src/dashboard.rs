//! Single-consumer event loop.
//!
//! Transport events, user commands, request completions and timers all arrive
//! on one queue and are handled to completion in arrival order. Requests and
//! timers run as spawned tasks that only report back through the queue, so the
//! session state needs no locking.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::gateway::Gateway;
use crate::presenter::{ConnectionStatus, Presenter};
use crate::session::{Effect, NoticeLevel, Outcome, SessionController, SessionState};
use crate::transport::{TransportEvent, TransportHealth};
use crate::types::{HistoryEntry, HistorySummary, ScanEvent, ScanId, ToolStatus};
use crate::validate::ScanRequest;

/// Events held while a start request is in flight, waiting for the new id.
const MAX_PENDING_EVENTS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Ctrl+Enter: start a scan with the last submitted request.
    CtrlEnter,
    /// Escape: dismiss the summary.
    Escape,
}

#[derive(Debug, Clone)]
pub enum Command {
    StartScan(ScanRequest),
    DownloadCurrent,
    ViewHistorical(String),
    DismissSummary,
    RefreshHistory,
    Key(KeyInput),
    Quit,
}

#[derive(Debug)]
pub enum AppEvent {
    Transport(TransportEvent),
    Command(Command),
    ScanStarted(ClientResult<ScanId>),
    ShowSummary(ScanId),
    HistoryLoaded(ClientResult<Vec<HistoryEntry>>),
    ToolsLoaded(ClientResult<ToolStatus>),
    DownloadFinished(ClientResult<Option<PathBuf>>),
}

impl From<TransportEvent> for AppEvent {
    fn from(ev: TransportEvent) -> Self {
        AppEvent::Transport(ev)
    }
}

impl From<Command> for AppEvent {
    fn from(cmd: Command) -> Self {
        AppEvent::Command(cmd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

pub struct Dashboard<P: Presenter> {
    config: ClientConfig,
    gateway: Gateway,
    presenter: P,
    sessions: SessionController,
    health: TransportHealth,
    tx: mpsc::UnboundedSender<AppEvent>,
    rx: Option<mpsc::UnboundedReceiver<AppEvent>>,
    shutdown: CancellationToken,
    connection: ConnectionStatus,
    start_enabled: bool,
    summary_visible: bool,
    last_request: Option<ScanRequest>,
    pending: VecDeque<ScanEvent>,
    /// Ids of sessions replaced by a later start. Their events are dropped on arrival.
    orphaned: HashSet<ScanId>,
    exit_when_finished: bool,
    load_on_start: bool,
}

impl<P: Presenter> Dashboard<P> {
    pub fn new(config: ClientConfig, gateway: Gateway, presenter: P) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sessions: SessionController::new(config.summary_delay),
            config,
            gateway,
            presenter,
            health: TransportHealth::new(),
            tx,
            rx: Some(rx),
            shutdown: CancellationToken::new(),
            connection: ConnectionStatus::Disconnected,
            start_enabled: true,
            summary_visible: false,
            last_request: None,
            pending: VecDeque::new(),
            orphaned: HashSet::new(),
            exit_when_finished: false,
            load_on_start: true,
        }
    }

    /// Leave the loop once the tracked scan fails, or completes and its
    /// summary has been shown. Used for one-shot CLI runs.
    pub fn exit_when_finished(mut self, enabled: bool) -> Self {
        self.exit_when_finished = enabled;
        self
    }

    /// Whether to fetch tool status and history when the loop starts.
    pub fn load_on_start(mut self, enabled: bool) -> Self {
        self.load_on_start = enabled;
        self
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<AppEvent> {
        self.tx.clone()
    }

    pub fn health(&self) -> TransportHealth {
        self.health.clone()
    }

    /// Cancelled when the loop exits; hand it to the transport task.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn sessions(&self) -> &SessionController {
        &self.sessions
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn start_enabled(&self) -> bool {
        self.start_enabled
    }

    pub fn summary_visible(&self) -> bool {
        self.summary_visible
    }

    pub async fn run(&mut self) {
        let Some(mut rx) = self.rx.take() else {
            warn!("dashboard loop already ran");
            return;
        };
        let shutdown = self.shutdown.clone();
        let mut health_tick = tokio::time::interval(self.config.health_interval);
        health_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.connection = ConnectionStatus::from(self.health.is_connected());
        self.presenter.connection_status(self.connection);

        if self.load_on_start {
            self.spawn_tool_status();
            self.spawn_history_refresh();
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = health_tick.tick() => self.poll_health(),
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if self.handle(event) == Flow::Exit {
                        break;
                    }
                }
            }
        }
        self.shutdown.cancel();
        info!(state = ?self.sessions.state(), "dashboard stopped");
    }

    fn handle(&mut self, event: AppEvent) -> Flow {
        match event {
            AppEvent::Transport(TransportEvent::Connected) => {
                self.set_connection(ConnectionStatus::Connected);
                self.presenter
                    .notify(NoticeLevel::Success, "Connected to server");
                Flow::Continue
            }
            AppEvent::Transport(TransportEvent::Disconnected) => {
                self.set_connection(ConnectionStatus::Disconnected);
                self.presenter
                    .notify(NoticeLevel::Error, "Disconnected from server");
                Flow::Continue
            }
            AppEvent::Transport(TransportEvent::Scan(ev)) => self.on_scan_event(ev),
            AppEvent::Command(cmd) => self.on_command(cmd),
            AppEvent::ScanStarted(result) => self.on_scan_started(result),
            AppEvent::ShowSummary(id) => self.on_show_summary(id),
            AppEvent::HistoryLoaded(Ok(entries)) => {
                let totals = HistorySummary::from_entries(&entries);
                self.presenter.history(&entries, &totals);
                Flow::Continue
            }
            AppEvent::HistoryLoaded(Err(e)) => {
                error!("Failed to load recent scans: {e}");
                Flow::Continue
            }
            AppEvent::ToolsLoaded(Ok(tools)) => {
                self.presenter.tool_status(&tools);
                Flow::Continue
            }
            AppEvent::ToolsLoaded(Err(e)) => {
                error!("Failed to load tool status: {e}");
                Flow::Continue
            }
            AppEvent::DownloadFinished(result) => {
                match result {
                    Ok(Some(path)) => self.presenter.notify(
                        NoticeLevel::Success,
                        &format!("Download started: {}", path.display()),
                    ),
                    Ok(None) => debug!("no output file recorded for this scan"),
                    Err(e) => {
                        warn!("download failed: {e}");
                        self.presenter
                            .notify(NoticeLevel::Error, "Failed to download results");
                    }
                }
                Flow::Continue
            }
        }
    }

    fn on_command(&mut self, cmd: Command) -> Flow {
        match cmd {
            Command::StartScan(request) => self.start_scan(request),
            Command::Key(KeyInput::CtrlEnter) => match self.last_request.clone() {
                Some(request) => self.start_scan(request),
                None => {
                    self.presenter
                        .notify(NoticeLevel::Error, "Please enter a target domain");
                    Flow::Continue
                }
            },
            Command::Key(KeyInput::Escape) | Command::DismissSummary => {
                if self.summary_visible {
                    self.summary_visible = false;
                    self.presenter.summary_dismissed();
                }
                Flow::Continue
            }
            Command::DownloadCurrent => {
                if let Some(id) = self.sessions.current_id().cloned() {
                    self.spawn_download(Some(id), None);
                }
                Flow::Continue
            }
            Command::ViewHistorical(filename) => {
                self.spawn_download(None, Some(filename));
                Flow::Continue
            }
            Command::RefreshHistory => {
                self.spawn_history_refresh();
                Flow::Continue
            }
            Command::Quit => Flow::Exit,
        }
    }

    fn start_scan(&mut self, request: ScanRequest) -> Flow {
        if !self.start_enabled {
            debug!("start ignored, a start request is already in flight");
            return Flow::Continue;
        }
        if let Err(e) = request.validate() {
            self.presenter.notify(NoticeLevel::Error, &e.to_string());
            self.presenter.inline_error(&e.to_string());
            return if self.exit_when_finished && self.sessions.current().is_none() {
                Flow::Exit
            } else {
                Flow::Continue
            };
        }

        self.last_request = Some(request.clone());
        self.set_start_enabled(false);
        self.pending.clear();
        info!(scan_target = %request.input.label(), format = %request.format, "submitting scan");

        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = gateway.start_scan(&request).await;
            let _ = tx.send(AppEvent::ScanStarted(result));
        });
        Flow::Continue
    }

    fn on_scan_started(&mut self, result: ClientResult<ScanId>) -> Flow {
        self.set_start_enabled(true);
        let pending = std::mem::take(&mut self.pending);
        match result {
            Ok(id) => {
                if let Some(prev) = self.sessions.current_id() {
                    if prev != &id {
                        self.orphaned.insert(prev.clone());
                    }
                }
                let effects = self.sessions.begin(id.clone());
                self.summary_visible = false;
                self.presenter
                    .notify(NoticeLevel::Success, "Scan started successfully");
                let mut flow = self.apply(effects);
                let early: Vec<ScanEvent> = pending
                    .into_iter()
                    .filter(|ev| ev.scan_id() == &id)
                    .collect();
                if !early.is_empty() {
                    debug!(count = early.len(), "replaying events that arrived before the start reply");
                }
                for ev in early {
                    if flow == Flow::Exit {
                        break;
                    }
                    flow = self.route(ev);
                }
                flow
            }
            Err(e) => {
                warn!("start scan failed: {e}");
                self.presenter
                    .notify(NoticeLevel::Error, &format!("Failed to start scan: {e}"));
                if self.exit_when_finished && self.sessions.current().is_none() {
                    Flow::Exit
                } else {
                    Flow::Continue
                }
            }
        }
    }

    fn on_scan_event(&mut self, ev: ScanEvent) -> Flow {
        if self.orphaned.contains(ev.scan_id()) {
            debug!(scan_id = %ev.scan_id(), kind = ev.kind(), "event for replaced scan dropped");
            return Flow::Continue;
        }
        if !self.start_enabled && !self.sessions.is_current(ev.scan_id()) {
            if self.pending.len() >= MAX_PENDING_EVENTS {
                warn!("pending event buffer full, evicting oldest event");
                self.pending.pop_front();
            }
            self.pending.push_back(ev);
            return Flow::Continue;
        }
        self.route(ev)
    }

    fn route(&mut self, ev: ScanEvent) -> Flow {
        match self.sessions.handle(&ev) {
            Outcome::Applied(effects) => self.apply(effects),
            Outcome::Duplicate | Outcome::Stale | Outcome::Ignored => Flow::Continue,
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> Flow {
        for effect in effects {
            match effect {
                Effect::ProgressReset(id) => self.presenter.progress_reset(&id),
                Effect::ProgressChanged(snapshot) => self.presenter.progress(&snapshot),
                Effect::ResultAppended(item) => self.presenter.result_row(&item),
                Effect::Notify(level, message) => self.presenter.notify(level, &message),
                Effect::InlineError(message) => self.presenter.inline_error(&message),
                Effect::RefreshHistory => self.spawn_history_refresh(),
                Effect::ScheduleSummary { scan_id, delay } => {
                    let tx = self.tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(AppEvent::ShowSummary(scan_id));
                    });
                }
            }
        }
        if self.exit_when_finished && self.sessions.state() == SessionState::Failed {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    fn on_show_summary(&mut self, id: ScanId) -> Flow {
        if !self.sessions.is_current(&id) {
            debug!(scan_id = %id, "summary for superseded scan skipped");
            return Flow::Continue;
        }
        let Some(summary) = self.sessions.summary(self.config.top_n) else {
            return Flow::Continue;
        };
        self.summary_visible = true;
        self.presenter.summary(&summary);
        if self.exit_when_finished {
            Flow::Exit
        } else {
            Flow::Continue
        }
    }

    fn poll_health(&mut self) {
        let status = ConnectionStatus::from(self.health.is_connected());
        self.set_connection(status);
    }

    fn set_connection(&mut self, status: ConnectionStatus) {
        if self.connection != status {
            self.connection = status;
            self.presenter.connection_status(status);
        }
    }

    fn set_start_enabled(&mut self, enabled: bool) {
        self.start_enabled = enabled;
        self.presenter.start_control(enabled);
    }

    fn spawn_history_refresh(&self) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(AppEvent::HistoryLoaded(gateway.scan_history().await));
        });
    }

    fn spawn_tool_status(&self) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(AppEvent::ToolsLoaded(gateway.tool_status().await));
        });
    }

    fn spawn_download(&self, scan_id: Option<ScanId>, filename: Option<String>) {
        let gateway = self.gateway.clone();
        let tx = self.tx.clone();
        let dir = self.config.download_dir.clone();
        tokio::spawn(async move {
            let result = download_artifact(&gateway, &dir, scan_id, filename).await;
            let _ = tx.send(AppEvent::DownloadFinished(result));
        });
    }
}

/// Resolve the artifact name (from the scan detail when only an id is known),
/// fetch it and write it under `dir`. `Ok(None)` when the backend recorded no
/// output file.
pub async fn download_artifact(
    gateway: &Gateway,
    dir: &Path,
    scan_id: Option<ScanId>,
    filename: Option<String>,
) -> ClientResult<Option<PathBuf>> {
    let filename = match (filename, scan_id) {
        (Some(f), _) => Some(f),
        (None, Some(id)) => gateway.fetch_session_detail(&id).await?.output_file,
        (None, None) => None,
    };
    let Some(filename) = filename else {
        return Ok(None);
    };
    let bytes = gateway.download(&filename).await?;
    let path = save_artifact(dir, &filename, &bytes).await?;
    Ok(Some(path))
}

/// Write an artifact under `dir`, keeping only the final path component of
/// the backend-supplied name.
pub async fn save_artifact(dir: &Path, filename: &str, bytes: &[u8]) -> ClientResult<PathBuf> {
    let name = Path::new(filename)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "download".into());
    let path = dir.join(name);
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ClientError::request_failed("save download", e))?;
    Ok(path)
}
