use std::net::SocketAddr;
use std::time::Duration;

/// Upper bound on the worker pool regardless of what the caller asks for.
pub const MAX_CONCURRENCY: usize = 5_000;

/// Tunables for one scan. Passed into the coordinator explicitly so tests can
/// shrink timeouts and pool size.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Number of workers probing in parallel.
    pub concurrency: usize,
    /// Bound on a single TCP connect.
    pub connect_timeout: Duration,
    /// Bound on each banner read after a successful connect.
    pub banner_timeout: Duration,
    /// Size of the single read used to capture a banner.
    pub banner_read_bytes: usize,
    /// Sanitized banners are cut to this many characters.
    pub banner_max_chars: usize,
    /// Send `HEAD / HTTP/1.0` to open ports that stay silent.
    pub http_nudge: bool,
    /// Bound on the name lookup for domain targets.
    pub resolve_timeout: Duration,
    /// Overall limit on the probing phase.
    pub scan_deadline: Option<Duration>,
}

impl Default for ScanConfig {
    // 256 workers at 200ms keeps a fully filtered 65535-port scan under a minute.
    fn default() -> Self {
        Self {
            concurrency: 256,
            connect_timeout: Duration::from_millis(200),
            banner_timeout: Duration::from_millis(300),
            banner_read_bytes: 512,
            banner_max_chars: 120,
            http_nudge: true,
            resolve_timeout: Duration::from_secs(5),
            scan_deadline: None,
        }
    }
}

impl ScanConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_banner_timeout(mut self, timeout: Duration) -> Self {
        self.banner_timeout = timeout;
        self
    }

    pub fn with_http_nudge(mut self, enabled: bool) -> Self {
        self.http_nudge = enabled;
        self
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn with_scan_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.scan_deadline = deadline;
        self
    }

    /// Pool size actually used for a range of `port_count` ports.
    pub fn effective_concurrency(&self, port_count: usize) -> usize {
        self.concurrency
            .clamp(1, MAX_CONCURRENCY)
            .min(port_count.max(1))
    }
}

/// Settings for the HTTP front end.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub scan: ScanConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 4000)),
            scan: ScanConfig::default().with_scan_deadline(Some(Duration::from_secs(120))),
        }
    }
}
