use std::fs::File;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use time::{format_description::well_known, OffsetDateTime};
use tokio_util::sync::CancellationToken;
use tracing::info;

use host_scan_rs::config::{ScanConfig, ServerConfig};
use host_scan_rs::ports::PortRange;
use host_scan_rs::scanner::{ScanProgress, Scanner};
use host_scan_rs::types::{ScanRequest, ScanResult};
use host_scan_rs::{init_tracing, server};

/// host-scan-rs — async TCP connect port scanner for a single host, with a small JSON HTTP API.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "host-scan-rs",
    version,
    about = "Async TCP connect port scanner for a single host, with a small JSON HTTP API.",
    long_about = None
)]
struct Cli {
    /// IPv4 address or domain name to scan. Required unless --serve is given.
    #[arg(long)]
    host: Option<String>,

    /// Scan mode: basic (ports 1-1024) or aggressive (1-65535).
    #[arg(long = "scan-type", default_value = "basic")]
    scan_type: String,

    /// Override the mode's port range, e.g. 8000-8100 or 443.
    #[arg(long)]
    ports: Option<PortRange>,

    /// Number of concurrent probe workers [default: 256].
    #[arg(long)]
    concurrency: Option<usize>,

    /// TCP connect timeout in milliseconds [default: 200].
    #[arg(long = "timeout-ms")]
    timeout_ms: Option<u64>,

    /// Banner read timeout in milliseconds [default: 300].
    #[arg(long = "banner-timeout-ms")]
    banner_timeout_ms: Option<u64>,

    /// Don't send an HTTP HEAD request to silent open ports.
    #[arg(long = "no-http-nudge", default_value_t = false)]
    no_http_nudge: bool,

    /// Abort a scan after this many seconds; 0 disables the limit [default: 120].
    #[arg(long = "deadline-secs")]
    deadline_secs: Option<u64>,

    /// Write the result as pretty JSON to this path (optional).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run the HTTP API instead of a one-shot scan.
    #[arg(long, default_value_t = false)]
    serve: bool,

    /// Address for the HTTP API [default: 0.0.0.0:4000].
    #[arg(long)]
    bind: Option<SocketAddr>,
}

impl Cli {
    /// `ServerConfig::default()` with any flags given on the command line applied.
    fn server_config(&self) -> ServerConfig {
        let defaults = ServerConfig::default();
        let mut scan: ScanConfig = defaults.scan;
        if let Some(concurrency) = self.concurrency {
            scan = scan.with_concurrency(concurrency);
        }
        if let Some(ms) = self.timeout_ms {
            scan = scan.with_connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = self.banner_timeout_ms {
            scan = scan.with_banner_timeout(Duration::from_millis(ms));
        }
        if let Some(secs) = self.deadline_secs {
            scan = scan.with_scan_deadline((secs > 0).then(|| Duration::from_secs(secs)));
        }
        if self.no_http_nudge {
            scan = scan.with_http_nudge(false);
        }
        ServerConfig {
            bind: self.bind.unwrap_or(defaults.bind),
            scan,
        }
    }
}

/// On-disk report: the API result plus when it was produced.
#[derive(Serialize)]
struct ScanReport<'a> {
    generated_at: String,
    #[serde(flatten)]
    result: &'a ScanResult,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let server_config = cli.server_config();
    if cli.serve {
        return server::spawn_server(server_config).await;
    }

    let Some(host) = cli.host.as_deref() else {
        bail!("--host is required unless --serve is given");
    };
    let request = ScanRequest::parse(host, &cli.scan_type)?;
    let range = cli
        .ports
        .unwrap_or_else(|| PortRange::for_scan_type(request.scan_type()));

    let config = server_config.scan;
    info!(
        host = %request.host(),
        scan_type = %request.scan_type(),
        ports = %range,
        concurrency = config.concurrency,
        timeout_ms = config.connect_timeout.as_millis() as u64,
        "scan configuration"
    );

    // Ctrl-C cancels the scan.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        cancel_ctrlc.cancel();
    });

    let progress = ScanProgress::new();
    let ticker = tokio::spawn(report_progress(progress.clone()));

    let scanner = Scanner::new(config);
    let outcome = scanner
        .scan_with(&request, range, cancel, Some(progress))
        .await;
    ticker.abort();
    let result = outcome?;

    print_results_table(&result);
    if let Some(path) = cli.output.as_deref() {
        write_results_json(path, &result)?;
        info!(path = %path.display(), "wrote JSON results");
    }

    Ok(())
}

async fn report_progress(progress: ScanProgress) {
    let mut tick = tokio::time::interval(Duration::from_secs(2));
    tick.tick().await;
    loop {
        tick.tick().await;
        let (scanned, open, total) = progress.snapshot();
        info!(scanned, total, open, "progress");
    }
}

fn print_results_table(result: &ScanResult) {
    let port_w = 5usize;
    let mut service_w = "service".len();
    let mut banner_w = "banner".len();
    for o in &result.open_ports {
        service_w = service_w.max(o.service.len());
        banner_w = banner_w.max(o.banner.chars().count().min(60));
    }

    println!(
        "\n{} ({}) [{}]  open: {} / {}  elapsed: {:.2}s",
        result.host,
        result.ip,
        result.scan_type,
        result.open_ports_count,
        result.total_ports_scanned,
        result.elapsed.as_secs_f64()
    );
    if result.open_ports.is_empty() {
        println!("No open ports found");
        return;
    }
    println!(
        "{:>port_w$}  {:<service_w$}  {:<banner_w$}",
        "port",
        "service",
        "banner",
        port_w = port_w,
        service_w = service_w,
        banner_w = banner_w
    );
    println!(
        "{:-<port_w$}  {:-<service_w$}  {:-<banner_w$}",
        "",
        "",
        "",
        port_w = port_w,
        service_w = service_w,
        banner_w = banner_w
    );
    for o in &result.open_ports {
        let bsnip: String = o.banner.chars().take(60).collect();
        println!(
            "{:>port_w$}  {:<service_w$}  {:<banner_w$}",
            o.port,
            o.service,
            bsnip,
            port_w = port_w,
            service_w = service_w,
            banner_w = banner_w
        );
    }
}

fn write_results_json(path: &Path, result: &ScanResult) -> Result<()> {
    let generated_at = OffsetDateTime::now_utc()
        .format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"));
    let report = ScanReport {
        generated_at,
        result,
    };
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, &report)?;
    Ok(())
}
