use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, trace};

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};
use crate::service;
use crate::types::ProbeOutcome;

/// Sent to open ports that stay silent, to coax web servers into answering.
const HTTP_NUDGE: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";

/// Probe one port with a single connect attempt.
///
/// - Connect is bounded by `connect_timeout`; any failure yields a closed outcome.
/// - On connect, reads a best-effort banner (see [`read_banner`]) and labels the service.
/// - The stream is dropped before returning on every path.
pub async fn probe(ip: IpAddr, port: u16, config: &ScanConfig) -> Result<ProbeOutcome> {
    if port == 0 {
        return Err(ScanError::InvalidPort(port));
    }

    let addr = SocketAddr::new(ip, port);
    let mut stream = match time::timeout(config.connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            trace!(%addr, error = %e, "connect failed");
            return Ok(ProbeOutcome::closed(port));
        }
        Err(_) => {
            trace!(%addr, "connect timed out");
            return Ok(ProbeOutcome::closed(port));
        }
    };

    let banner = read_banner(&mut stream, config).await;
    drop(stream);

    let service = service::identify(port, &banner);
    debug!(%addr, %service, %banner, "open port");
    Ok(ProbeOutcome::open(port, service, banner))
}

/// Passive read first; if the peer says nothing, optionally send the HTTP nudge and read once more.
async fn read_banner(stream: &mut TcpStream, config: &ScanConfig) -> String {
    if let Some(raw) = read_chunk(stream, config).await {
        return sanitize_banner(&raw, config.banner_max_chars);
    }
    if !config.http_nudge {
        return String::new();
    }
    match time::timeout(config.banner_timeout, stream.write_all(HTTP_NUDGE)).await {
        Ok(Ok(())) => {}
        _ => return String::new(),
    }
    read_chunk(stream, config)
        .await
        .map(|raw| sanitize_banner(&raw, config.banner_max_chars))
        .unwrap_or_default()
}

async fn read_chunk(stream: &mut TcpStream, config: &ScanConfig) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; config.banner_read_bytes.max(1)];
    match time::timeout(config.banner_timeout, stream.read(&mut buf)).await {
        Ok(Ok(n)) if n > 0 => {
            buf.truncate(n);
            Some(buf)
        }
        _ => None,
    }
}

/// Lossy UTF-8, control characters and whitespace runs collapsed to one space,
/// trimmed, cut to `max_chars` characters.
pub fn sanitize_banner(raw: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(text.len().min(max_chars));
    let mut pending_space = false;
    let mut count = 0usize;
    for c in text.chars() {
        if c.is_whitespace() || c.is_control() || c == char::REPLACEMENT_CHARACTER {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            if count + 1 >= max_chars {
                break;
            }
            out.push(' ');
            count += 1;
        }
        pending_space = false;
        if count >= max_chars {
            break;
        }
        out.push(c);
        count += 1;
    }
    out
}
