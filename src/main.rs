use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use subarg_client::config::{
    ClientConfig, DEFAULT_HEALTH_INTERVAL_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SERVER_URL, DEFAULT_SUMMARY_DELAY_MS, DEFAULT_TOP_N,
};
use subarg_client::dashboard::{download_artifact, save_artifact, Command, Dashboard};
use subarg_client::presenter::{ConsolePresenter, Presenter};
use subarg_client::types::{HistorySummary, OutputFormat, ScanId};
use subarg_client::validate::{ScanRequest, TargetInput};
use subarg_client::{transport, ClientError, Gateway, SessionState};

/// subarg-client: start subdomain-enumeration scans on a SubARG backend and follow them live.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "subarg-client",
    version,
    about = "Start subdomain-enumeration scans on a SubARG backend and follow them live.",
    long_about = None
)]
struct Cli {
    /// Backend base URL.
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Request timeout in seconds for request/response calls.
    #[arg(long = "timeout-secs", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,

    /// Period of the connection health check in seconds.
    #[arg(long = "health-interval-secs", default_value_t = DEFAULT_HEALTH_INTERVAL_SECS)]
    health_interval_secs: u64,

    /// Delay between scan completion and the detailed summary, in milliseconds.
    #[arg(long = "summary-delay-ms", default_value_t = DEFAULT_SUMMARY_DELAY_MS)]
    summary_delay_ms: u64,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Clone, Subcommand)]
enum Cmd {
    /// Start a scan and follow its progress until it finishes.
    Scan(ScanArgs),
    /// Show which enumeration tools the backend has installed.
    Tools,
    /// List recent result artifacts.
    History,
    /// Show the backend's record of one scan.
    Detail {
        /// Scan id returned when the scan started.
        id: String,
    },
    /// Download a result artifact.
    Download {
        /// Artifact filename as listed by `history`.
        filename: String,
        /// Directory to write into.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct ScanArgs {
    /// Single target domain, e.g. example.com.
    #[arg(long, conflicts_with = "list")]
    target: Option<String>,

    /// File with one target domain per line.
    #[arg(long)]
    list: Option<PathBuf>,

    /// Output artifact format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Txt)]
    format: OutputFormat,

    /// Custom output filename (extension is added by the backend).
    #[arg(long)]
    filename: Option<String>,

    /// Save the finished artifact into this directory.
    #[arg(long = "download-dir")]
    download_dir: Option<PathBuf>,

    /// Number of subdomains listed in the summary.
    #[arg(long = "top", default_value_t = DEFAULT_TOP_N)]
    top: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("subarg_client=warn")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ClientConfig::with_server(cli.server.clone());
    config.request_timeout = Duration::from_secs(cli.timeout_secs);
    config.health_interval = Duration::from_secs(cli.health_interval_secs.max(1));
    config.summary_delay = Duration::from_millis(cli.summary_delay_ms);

    let gateway = Gateway::new(&config).context("failed to set up backend client")?;

    match cli.command {
        Cmd::Scan(args) => run_scan(config, gateway, args).await,
        Cmd::Tools => {
            let tools = gateway.tool_status().await?;
            ConsolePresenter::new().tool_status(&tools);
            Ok(())
        }
        Cmd::History => {
            let entries = gateway.scan_history().await?;
            let totals = HistorySummary::from_entries(&entries);
            ConsolePresenter::new().history(&entries, &totals);
            Ok(())
        }
        Cmd::Detail { id } => {
            let detail = gateway.fetch_session_detail(&ScanId::new(id)).await?;
            println!("{}", serde_json::to_string_pretty(&detail)?);
            Ok(())
        }
        Cmd::Download { filename, out } => {
            let bytes = gateway.download(&filename).await?;
            let path = save_artifact(&out, &filename, &bytes).await?;
            println!("Wrote {} ({} bytes)", path.display(), bytes.len());
            Ok(())
        }
    }
}

async fn run_scan(mut config: ClientConfig, gateway: Gateway, args: ScanArgs) -> Result<()> {
    let input = TargetInput::from_choice(args.target.as_deref(), args.list.as_deref())?;
    let request = ScanRequest::new(input, args.format, args.filename.clone());
    config.top_n = args.top;
    if let Some(dir) = &args.download_dir {
        config.download_dir = dir.clone();
    }

    println!("subarg-client configuration:");
    println!("  server       : {}", config.server_url);
    println!("  target       : {}", request.input.label());
    println!("  format       : {}", request.format);
    println!(
        "  filename     : {}",
        request.filename.as_deref().unwrap_or("<backend default>")
    );

    let mut dashboard = Dashboard::new(config.clone(), gateway.clone(), ConsolePresenter::new())
        .exit_when_finished(true)
        .load_on_start(false);
    let tx = dashboard.sender();

    let transport_task = transport::spawn(
        gateway.events_url(),
        dashboard.health(),
        tx.clone(),
        config.reconnect_delay,
        dashboard.shutdown_token(),
    );

    let quit_tx = tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = quit_tx.send(Command::Quit.into());
    });

    tx.send(Command::StartScan(request).into())
        .context("dashboard queue closed")?;
    dashboard.run().await;
    let _ = transport_task.await;

    let sessions = dashboard.sessions();
    match sessions.state() {
        SessionState::Completed => {
            if args.download_dir.is_some() {
                if let Some(id) = sessions.current_id() {
                    let saved =
                        download_artifact(&gateway, &config.download_dir, Some(id.clone()), None)
                            .await?;
                    match saved {
                        Some(path) => println!("Wrote {}", path.display()),
                        None => println!("Backend recorded no output file for this scan"),
                    }
                }
            }
            Ok(())
        }
        SessionState::Failed => {
            let reason = sessions
                .current()
                .and_then(|s| s.error())
                .unwrap_or("unknown error");
            Err(ClientError::ScanFailed(reason.to_string()).into())
        }
        SessionState::Running => {
            println!("Stopped following the scan; it keeps running on the backend.");
            Ok(())
        }
        SessionState::Idle => bail!("scan did not start"),
    }
}
