//! Library crate for host-scan-rs: resolve a host, probe its TCP ports through a
//! bounded worker pool, and report the open ones.
pub mod config;
pub mod error;
pub mod ports;
pub mod prober;
pub mod resolver;
pub mod scanner;
pub mod server;
pub mod service;
pub mod types;

pub use error::ScanError;
pub use scanner::Scanner;
pub use types::{ProbeOutcome, ScanRequest, ScanResult, ScanType};

use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber honouring `RUST_LOG` (default `info`). Safe to call twice.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
