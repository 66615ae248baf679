mod support;

use subarg_client::config::ClientConfig;
use subarg_client::types::{HistorySummary, OutputFormat, ScanId};
use subarg_client::validate::{ScanRequest, TargetInput};
use subarg_client::{ClientError, Gateway};
use support::{spawn_backend, BackendState};

fn gateway(base: &str) -> Gateway {
    Gateway::new(&ClientConfig::with_server(base)).expect("gateway")
}

#[tokio::test]
async fn start_scan_returns_backend_id_and_sends_single_target() {
    let state = BackendState::with_ids(&["3f2a9c1e-0000-4000-8000-000000000001"]);
    let base = spawn_backend(state.clone()).await;
    let gw = gateway(&base);

    let req = ScanRequest::new(
        TargetInput::single("example.com").unwrap(),
        OutputFormat::Json,
        Some("corp".into()),
    );
    let id = gw.start_scan(&req).await.unwrap();
    assert_eq!(id, ScanId::new("3f2a9c1e-0000-4000-8000-000000000001"));

    let bodies = state.received();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["target"], "example.com");
    assert!(bodies[0]["target_list"].is_null());
    assert_eq!(bodies[0]["output_format"], "json");
    assert_eq!(bodies[0]["filename"], "corp");
}

#[tokio::test]
async fn start_scan_sends_list_content() {
    let state = BackendState::default();
    let base = spawn_backend(state.clone()).await;
    let gw = gateway(&base);

    let req = ScanRequest::new(
        TargetInput::list("example.com\nexample.org\n").unwrap(),
        OutputFormat::Txt,
        None,
    );
    gw.start_scan(&req).await.unwrap();

    let bodies = state.received();
    assert!(bodies[0]["target"].is_null());
    assert_eq!(bodies[0]["target_list"], "example.com\nexample.org\n");
    assert!(bodies[0]["filename"].is_null());
}

#[tokio::test]
async fn invalid_input_never_reaches_backend() {
    let state = BackendState::default();
    let base = spawn_backend(state.clone()).await;
    let gw = gateway(&base);

    let req = ScanRequest::new(
        TargetInput::Single("not a domain".into()),
        OutputFormat::Txt,
        None,
    );
    let err = gw.start_scan(&req).await.unwrap_err();
    assert!(err.is_validation());
    assert!(state.received().is_empty());
}

#[tokio::test]
async fn backend_error_is_request_failed() {
    let base = spawn_backend(BackendState::failing()).await;
    let gw = gateway(&base);

    let req = ScanRequest::new(
        TargetInput::single("example.com").unwrap(),
        OutputFormat::Txt,
        None,
    );
    match gw.start_scan(&req).await {
        Err(ClientError::RequestFailed { operation, source }) => {
            assert_eq!(operation, "start scan");
            assert!(source.to_string().contains("500"));
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_backend_is_request_failed() {
    // Bind then drop to get a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gw = gateway(&format!("http://{addr}"));
    let err = gw.tool_status().await.unwrap_err();
    assert!(matches!(err, ClientError::RequestFailed { operation: "load tool status", .. }));
}

#[tokio::test]
async fn detail_resolves_output_file() {
    let base = spawn_backend(BackendState::default()).await;
    let gw = gateway(&base);

    let detail = gw.fetch_session_detail(&ScanId::new("abc")).await.unwrap();
    assert_eq!(detail.output_file.as_deref(), Some("abc.txt"));
    assert_eq!(detail.total_subdomains, Some(2));
    assert_eq!(detail.status.as_deref(), Some("completed"));

    let err = gw
        .fetch_session_detail(&ScanId::new("missing"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::RequestFailed { .. }));
}

#[tokio::test]
async fn history_and_tools() {
    let base = spawn_backend(BackendState::default()).await;
    let gw = gateway(&base);

    let entries = gw.scan_history().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].size, 2048);
    assert_eq!(
        HistorySummary::from_entries(&entries),
        HistorySummary {
            total_scans: 2,
            total_subdomains: 3
        }
    );

    let tools = gw.tool_status().await.unwrap();
    assert_eq!(tools.get("subfinder"), Some(&true));
    assert_eq!(tools.get("amass"), Some(&false));
}

#[tokio::test]
async fn download_returns_raw_bytes() {
    let base = spawn_backend(BackendState::default()).await;
    let gw = gateway(&base);

    let bytes = gw.download("out.txt").await.unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("# SubARG Results - out.txt"));

    assert!(gw.download("absent.csv").await.is_err());
}
