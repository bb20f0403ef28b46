//! Target validation and name resolution.
//!
//! Accepted hosts are either a dotted-quad IPv4 literal or a domain name whose
//! labels are 1-63 alphanumeric/hyphen characters (no leading or trailing
//! hyphen) and whose last label is at least two ASCII letters.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::lookup_host;
use tokio::time;
use tracing::debug;

use crate::error::{Result, ScanError};

const MAX_DOMAIN_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

/// A host that passed grammar validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSpec {
    Ipv4(Ipv4Addr),
    Domain(String),
}

impl HostSpec {
    /// Classify `host` as an IPv4 literal or a domain name, or reject it.
    pub fn parse(host: &str) -> Result<Self> {
        if host.is_empty() {
            return Err(ScanError::invalid_input("host is required"));
        }
        if let Some(ip) = parse_ipv4_literal(host) {
            return Ok(HostSpec::Ipv4(ip));
        }
        if is_domain_name(host) {
            return Ok(HostSpec::Domain(host.to_ascii_lowercase()));
        }
        Err(ScanError::invalid_input(format!(
            "{host:?} is not a valid IPv4 address or domain name"
        )))
    }
}

/// Turns a validated host into the single address a scan targets.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn lookup(&self, domain: &str) -> Result<IpAddr>;
}

/// Resolve `host` to the scan target. IPv4 literals never touch the network.
pub async fn resolve(resolver: &dyn Resolve, host: &str) -> Result<IpAddr> {
    match HostSpec::parse(host)? {
        HostSpec::Ipv4(ip) => Ok(IpAddr::V4(ip)),
        HostSpec::Domain(domain) => resolver.lookup(&domain).await,
    }
}

/// Uses the operating system resolver via `tokio::net::lookup_host`.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Resolve for SystemResolver {
    async fn lookup(&self, domain: &str) -> Result<IpAddr> {
        let addrs: Vec<IpAddr> = match time::timeout(self.timeout, lookup_host((domain, 0))).await {
            Ok(Ok(iter)) => iter.map(|sock| sock.ip()).collect(),
            Ok(Err(e)) => return Err(ScanError::resolution(domain, e)),
            Err(_) => {
                return Err(ScanError::resolution(
                    domain,
                    format!("lookup timed out after {:?}", self.timeout),
                ))
            }
        };
        debug!(domain, ?addrs, "resolved");
        pick_address(&addrs).ok_or_else(|| ScanError::resolution(domain, "no addresses returned"))
    }
}

/// Fixed name table, for tests and offline use.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: Vec<(String, IpAddr)>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, domain: &str, ip: IpAddr) -> Self {
        self.entries.push((domain.to_ascii_lowercase(), ip));
        self
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn lookup(&self, domain: &str) -> Result<IpAddr> {
        self.entries
            .iter()
            .find(|(name, _)| name == domain)
            .map(|(_, ip)| *ip)
            .ok_or_else(|| ScanError::resolution(domain, "no such host"))
    }
}

/// First IPv4 address in answer order, else the first address at all.
fn pick_address(addrs: &[IpAddr]) -> Option<IpAddr> {
    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

/// Four decimal octets of 1-3 digits, each at most 255. Leading zeros are read as decimal.
fn parse_ipv4_literal(s: &str) -> Option<Ipv4Addr> {
    let mut octets = [0u8; 4];
    let mut parts = s.split('.');
    for slot in octets.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *slot = part.parse::<u8>().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(Ipv4Addr::from(octets))
}

fn is_domain_name(s: &str) -> bool {
    if s.len() > MAX_DOMAIN_LEN {
        return false;
    }
    let labels: Vec<&str> = s.split('.').collect();
    let Some((tld, rest)) = labels.split_last() else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }
    let tld_ok = (2..=MAX_LABEL_LEN).contains(&tld.len())
        && tld.bytes().all(|b| b.is_ascii_alphabetic());
    tld_ok && rest.iter().all(|label| is_valid_label(label))
}

fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) => {
            bytes.len() <= MAX_LABEL_LEN
                && first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}
