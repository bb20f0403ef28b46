use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ScanError;

/// Scan intensity; selects the port range.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Basic,
    Aggressive,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Basic => "basic",
            ScanType::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, surrounding whitespace ignored.
impl FromStr for ScanType {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(ScanType::Basic),
            "aggressive" => Ok(ScanType::Aggressive),
            other => Err(ScanError::invalid_input(format!(
                "unknown scan_type {other:?} (expected \"basic\" or \"aggressive\")"
            ))),
        }
    }
}

/// Validated scan input. The host is only trimmed here; its grammar is checked on resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    host: String,
    scan_type: ScanType,
}

impl ScanRequest {
    pub fn new(host: impl Into<String>, scan_type: ScanType) -> Self {
        Self {
            host: host.into().trim().to_string(),
            scan_type,
        }
    }

    /// Build a request from the raw wire pair, rejecting unknown scan types.
    pub fn parse(host: &str, scan_type: &str) -> Result<Self, ScanError> {
        Ok(Self::new(host, scan_type.parse()?))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }
}

/// Result of probing a single port.
///
/// Only open outcomes ever reach a [`ScanResult`], so `open` is left off the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub port: u16,
    #[serde(skip_serializing, default = "open_on_wire")]
    pub open: bool,
    pub service: String,
    pub banner: String,
}

fn open_on_wire() -> bool {
    true
}

impl ProbeOutcome {
    pub fn closed(port: u16) -> Self {
        Self {
            port,
            open: false,
            service: String::new(),
            banner: String::new(),
        }
    }

    pub fn open(port: u16, service: impl Into<String>, banner: impl Into<String>) -> Self {
        Self {
            port,
            open: true,
            service: service.into(),
            banner: banner.into(),
        }
    }
}

/// Aggregate result of one completed scan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub ip: IpAddr,
    pub host: String,
    pub scan_type: ScanType,
    #[serde(
        rename = "elapsed_time",
        serialize_with = "serialize_elapsed",
        deserialize_with = "deserialize_elapsed"
    )]
    pub elapsed: Duration,
    /// Ascending by port.
    pub open_ports: Vec<ProbeOutcome>,
    pub total_ports_scanned: u64,
    pub open_ports_count: u64,
}

/// Seconds, rounded to two decimals.
fn serialize_elapsed<S: Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    let secs = (elapsed.as_secs_f64() * 100.0).round() / 100.0;
    s.serialize_f64(secs)
}

fn deserialize_elapsed<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(d)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}
