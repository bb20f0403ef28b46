use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::error::ScanError;
use crate::types::ScanType;

/// Contiguous, inclusive range of TCP ports probed by one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Build a range, rejecting port 0 and inverted bounds.
    pub fn new(start: u16, end: u16) -> Result<Self, ScanError> {
        if start == 0 {
            return Err(ScanError::InvalidPort(0));
        }
        if start > end {
            return Err(ScanError::invalid_input(format!(
                "invalid port range {start}-{end} (start > end)"
            )));
        }
        Ok(Self { start, end })
    }

    /// The range a scan mode covers: well-known ports for `basic`, everything for `aggressive`.
    pub fn for_scan_type(scan_type: ScanType) -> Self {
        match scan_type {
            ScanType::Basic => Self { start: 1, end: 1024 },
            ScanType::Aggressive => Self { start: 1, end: u16::MAX },
        }
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    /// Number of ports in the range. Never zero, so there is no `is_empty`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    pub fn iter(&self) -> RangeInclusive<u16> {
        self.start..=self.end
    }
}

impl IntoIterator for PortRange {
    type Item = u16;
    type IntoIter = RangeInclusive<u16>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parses `start-end` or a single port number.
impl FromStr for PortRange {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((a, b)) = s.split_once('-') {
            let start = parse_port_str(a.trim())?;
            let end = parse_port_str(b.trim())?;
            return PortRange::new(start, end);
        }
        let p = parse_port_str(s)?;
        PortRange::new(p, p)
    }
}

fn parse_port_str(s: &str) -> Result<u16, ScanError> {
    let val: u32 = s
        .parse::<u32>()
        .map_err(|e| ScanError::invalid_input(format!("invalid port value {s:?}: {e}")))?;
    if val == 0 || val > 65535 {
        return Err(ScanError::invalid_input(format!("port out of range: {val}")));
    }
    Ok(val as u16)
}
