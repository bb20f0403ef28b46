use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::ports::PortRange;
use crate::prober;
use crate::resolver::{self, Resolve, SystemResolver};
use crate::types::{ProbeOutcome, ScanRequest, ScanResult};

/// Live counters for a running scan. Clone it before starting the scan to watch progress.
#[derive(Clone, Debug, Default)]
pub struct ScanProgress {
    pub total: Arc<AtomicU64>,
    pub scanned: Arc<AtomicU64>,
    pub open: Arc<AtomicU64>,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(scanned, open, total)` at this instant.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.scanned.load(Ordering::Relaxed),
            self.open.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

/// Drives one or more independent scans. Holds only immutable configuration,
/// so a single `Scanner` can serve concurrent scans.
#[derive(Clone)]
pub struct Scanner {
    config: ScanConfig,
    resolver: Arc<dyn Resolve>,
    /// Makes the worker that pulls this port panic.
    #[cfg(test)]
    fail_on_port: Option<u16>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        let resolver = Arc::new(SystemResolver::new(config.resolve_timeout));
        Self::with_resolver(config, resolver)
    }

    pub fn with_resolver(config: ScanConfig, resolver: Arc<dyn Resolve>) -> Self {
        Self {
            config,
            resolver,
            #[cfg(test)]
            fail_on_port: None,
        }
    }

    /// Scan the port range selected by the request's scan type.
    pub async fn scan(&self, request: &ScanRequest) -> Result<ScanResult> {
        let range = PortRange::for_scan_type(request.scan_type());
        self.scan_with(request, range, CancellationToken::new(), None)
            .await
    }

    /// Scan an explicit port range instead of the scan type's default.
    pub async fn scan_range(&self, request: &ScanRequest, range: PortRange) -> Result<ScanResult> {
        self.scan_with(request, range, CancellationToken::new(), None)
            .await
    }

    /// Full-control variant: external cancellation and optional live progress.
    ///
    /// Cancelling `cancel` (or hitting the configured deadline) aborts every
    /// in-flight probe and fails the scan. Dropping the returned future aborts
    /// the workers too.
    pub async fn scan_with(
        &self,
        request: &ScanRequest,
        range: PortRange,
        cancel: CancellationToken,
        progress: Option<ScanProgress>,
    ) -> Result<ScanResult> {
        let ip = resolver::resolve(self.resolver.as_ref(), request.host())
            .await
            .inspect_err(|e| warn!(host = %request.host(), error = %e, "target rejected"))?;

        info!(
            host = %request.host(),
            %ip,
            scan_type = %request.scan_type(),
            ports = %range,
            "scan started"
        );

        let progress = progress.unwrap_or_default();
        progress.total.store(range.len() as u64, Ordering::Relaxed);

        let start = Instant::now();
        let mut open_ports = self.run_pool(ip, range, cancel, &progress).await?;
        let elapsed = start.elapsed();

        open_ports.sort_by_key(|o| o.port);

        info!(
            host = %request.host(),
            %ip,
            open = open_ports.len(),
            total = range.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "scan finished"
        );

        Ok(ScanResult {
            ip,
            host: request.host().to_string(),
            scan_type: request.scan_type(),
            elapsed,
            open_ports_count: open_ports.len() as u64,
            open_ports,
            total_ports_scanned: range.len() as u64,
        })
    }

    /// Fixed pool of workers pulling port numbers from one channel; every
    /// outcome flows back to this task, which keeps the open ones.
    async fn run_pool(
        &self,
        ip: IpAddr,
        range: PortRange,
        cancel: CancellationToken,
        progress: &ScanProgress,
    ) -> Result<Vec<ProbeOutcome>> {
        // Child token: a deadline stops this pool without cancelling the caller's token.
        let cancel = cancel.child_token();
        let workers = self.config.effective_concurrency(range.len());
        let (port_tx, port_rx) = mpsc::channel::<u16>(workers * 2);
        let port_rx = Arc::new(Mutex::new(port_rx));
        let (out_tx, mut out_rx) = mpsc::channel::<ProbeOutcome>(workers * 2);

        let mut set = JoinSet::new();

        let feeder_cancel = cancel.clone();
        set.spawn(async move {
            for port in range {
                tokio::select! {
                    _ = feeder_cancel.cancelled() => break,
                    sent = port_tx.send(port) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        for _ in 0..workers {
            let port_rx = port_rx.clone();
            let out_tx = out_tx.clone();
            let cancel = cancel.clone();
            let config = self.config.clone();
            #[cfg(test)]
            let fail_on_port = self.fail_on_port;
            set.spawn(async move {
                loop {
                    let next = port_rx.lock().await.recv().await;
                    let Some(port) = next else { break };
                    #[cfg(test)]
                    if fail_on_port == Some(port) {
                        panic!("worker failed on port {port}");
                    }
                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => break,
                        res = prober::probe(ip, port, &config) => res,
                    };
                    // Only port 0 can fail here and PortRange never yields it.
                    let outcome = outcome.unwrap_or_else(|_| ProbeOutcome::closed(port));
                    if out_tx.send(outcome).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(out_tx);

        let deadline = self.config.scan_deadline;
        let sleep = time::sleep(deadline.unwrap_or(Duration::MAX));
        tokio::pin!(sleep);

        let mut open_ports = Vec::new();
        let mut completed = 0usize;
        loop {
            tokio::select! {
                maybe = out_rx.recv() => match maybe {
                    Some(outcome) => {
                        completed += 1;
                        progress.scanned.fetch_add(1, Ordering::Relaxed);
                        if outcome.open {
                            progress.open.fetch_add(1, Ordering::Relaxed);
                            open_ports.push(outcome);
                        }
                    }
                    None => break,
                },
                _ = cancel.cancelled() => {
                    set.abort_all();
                    return Err(ScanError::Cancelled);
                }
                _ = &mut sleep, if deadline.is_some() => {
                    cancel.cancel();
                    set.abort_all();
                    return Err(ScanError::DeadlineExceeded(deadline.unwrap_or_default()));
                }
            }
        }

        // Workers stop quietly on cancellation, so the channel can close before the branch above fires.
        if cancel.is_cancelled() {
            set.abort_all();
            return Err(ScanError::Cancelled);
        }

        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                warn!(%ip, error = %e, "scan worker failed");
            }
        }

        if completed < range.len() {
            warn!(
                %ip,
                completed,
                total = range.len(),
                "some ports were not probed; reporting best-effort result"
            );
        }

        Ok(open_ports)
    }
}
