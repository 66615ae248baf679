use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_SUMMARY_DELAY_MS: u64 = 1000;
pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 2;
pub const DEFAULT_TOP_N: usize = 10;

/// Runtime settings for the client. The binary fills this from CLI flags.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL, without the `/api` prefix.
    pub server_url: String,
    pub request_timeout: Duration,
    /// Period of the transport health poll.
    pub health_interval: Duration,
    /// Delay between completion and the detailed summary.
    pub summary_delay: Duration,
    /// Pause before re-opening the event stream once it closes for good.
    pub reconnect_delay: Duration,
    /// Number of subdomains listed in the end-of-scan summary.
    pub top_n: usize,
    /// Where downloaded artifacts are written.
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            health_interval: Duration::from_secs(DEFAULT_HEALTH_INTERVAL_SECS),
            summary_delay: Duration::from_millis(DEFAULT_SUMMARY_DELAY_MS),
            reconnect_delay: Duration::from_secs(DEFAULT_RECONNECT_DELAY_SECS),
            top_n: DEFAULT_TOP_N,
            download_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    pub fn with_server(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }
}
