//! Request/response calls to the scan backend.

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::types::{HistoryEntry, ScanDetail, ScanId, ScanStarted, ToolStatus};
use crate::validate::ScanRequest;

#[derive(Clone, Debug)]
pub struct Gateway {
    client: Client,
    base: Url,
}

impl Gateway {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let base = Url::parse(&config.server_url).map_err(|e| {
            ClientError::Validation(format!("invalid server url {}: {e}", config.server_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(ClientError::Validation(format!(
                "invalid server url {}",
                config.server_url
            )));
        }
        let client = Client::builder().timeout(config.request_timeout).build()?;
        info!(server = %base, "gateway ready");
        Ok(Self { client, base })
    }

    /// `{server}/api/{segments...}`, each segment percent-encoded.
    pub fn api_url<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("api").extend(segments);
        }
        url
    }

    /// URL of the server-sent event stream.
    pub fn events_url(&self) -> Url {
        self.api_url(["events"])
    }

    pub fn download_url(&self, filename: &str) -> Url {
        self.api_url(["download", filename])
    }

    /// Submit a scan. Input is validated before anything goes on the wire.
    pub async fn start_scan(&self, request: &ScanRequest) -> ClientResult<ScanId> {
        request.validate()?;
        let body = request.to_body();
        debug!(format = %body.output_format, scan_target = ?body.target, "starting scan");
        let started: ScanStarted = self
            .execute_json(
                "start scan",
                self.client.post(self.api_url(["scan"])).json(&body),
            )
            .await?;
        info!(scan_id = %started.scan_id, "scan accepted by backend");
        Ok(started.scan_id)
    }

    pub async fn fetch_session_detail(&self, scan_id: &ScanId) -> ClientResult<ScanDetail> {
        self.execute_json(
            "fetch scan detail",
            self.client.get(self.api_url(["scan", scan_id.as_str()])),
        )
        .await
    }

    pub async fn tool_status(&self) -> ClientResult<ToolStatus> {
        self.execute_json(
            "load tool status",
            self.client.get(self.api_url(["installed_tools"])),
        )
        .await
    }

    pub async fn scan_history(&self) -> ClientResult<Vec<HistoryEntry>> {
        self.execute_json(
            "load recent scans",
            self.client.get(self.api_url(["results"])),
        )
        .await
    }

    /// Raw artifact bytes. Not parsed.
    pub async fn download(&self, filename: &str) -> ClientResult<Vec<u8>> {
        let response = self
            .execute_raw("download results", self.client.get(self.download_url(filename)))
            .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::request_failed("download results", e))?;
        Ok(bytes.to_vec())
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> ClientResult<T> {
        let response = self.execute_raw(operation, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::request_failed(operation, e))
    }

    async fn execute_raw(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> ClientResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::request_failed(operation, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(ClientError::request_failed(
            operation,
            anyhow::anyhow!("request failed with status {status}: {text}"),
        ))
    }
}
