use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use host_scan_rs::config::ScanConfig;
use host_scan_rs::ports::PortRange;
use host_scan_rs::resolver::{Resolve, StaticResolver};
use host_scan_rs::scanner::Scanner;
use host_scan_rs::types::{ScanRequest, ScanResult, ScanType};
use host_scan_rs::ScanError;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn fast_config() -> ScanConfig {
    ScanConfig::default()
        .with_concurrency(64)
        .with_connect_timeout(Duration::from_millis(200))
        .with_banner_timeout(Duration::from_millis(50))
        .with_http_nudge(false)
}

/// Listener that greets every connection, returning its port.
async fn spawn_greeter(greeting: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut s, _)) = listener.accept().await {
            let _ = s.write_all(greeting).await;
        }
    });
    port
}

fn assert_invariants(result: &ScanResult, range: PortRange) {
    assert_eq!(result.open_ports_count as usize, result.open_ports.len());
    assert_eq!(result.total_ports_scanned as usize, range.len());
    assert!(result
        .open_ports
        .windows(2)
        .all(|w| w[0].port < w[1].port));
    for o in &result.open_ports {
        assert!(o.open);
        assert!(range.contains(o.port), "port {} outside {}", o.port, range);
        assert!(!o.service.is_empty());
    }
}

#[tokio::test]
async fn single_listener_is_the_only_open_port() {
    let port = spawn_greeter(b"SSH-2.0-OpenSSH_9.6\r\n").await;
    let range = PortRange::new(port - 1, port + 1).unwrap();

    let scanner = Scanner::new(fast_config());
    let req = ScanRequest::new("127.0.0.1", ScanType::Basic);
    let result = scanner.scan_range(&req, range).await.unwrap();

    assert_invariants(&result, range);
    assert_eq!(result.ip, LOCALHOST);
    assert_eq!(result.open_ports_count, 1);
    assert_eq!(result.open_ports[0].port, port);
    assert_eq!(result.open_ports[0].banner, "SSH-2.0-OpenSSH_9.6");
    assert_eq!(result.open_ports[0].service, "ssh");
}

#[tokio::test]
async fn padded_host_is_trimmed_before_scanning() {
    let port = spawn_greeter(b"+OK ready\r\n").await;
    let range = PortRange::new(port, port).unwrap();

    let req = ScanRequest::new("  127.0.0.1 \n", ScanType::Basic);
    assert_eq!(req.host(), "127.0.0.1");

    let result = Scanner::new(fast_config())
        .scan_range(&req, range)
        .await
        .unwrap();
    assert_eq!(result.host, "127.0.0.1");
    assert_eq!(result.ip, LOCALHOST);
    assert_eq!(result.open_ports_count, 1);
}

#[tokio::test]
async fn basic_scan_covers_well_known_range() {
    let scanner = Scanner::new(fast_config().with_concurrency(256));
    let req = ScanRequest::parse("127.0.0.1", "basic").unwrap();
    let result = scanner.scan(&req).await.unwrap();

    assert_eq!(result.total_ports_scanned, 1024);
    assert_eq!(result.scan_type, ScanType::Basic);
    assert_eq!(result.host, "127.0.0.1");
    assert_invariants(&result, PortRange::for_scan_type(ScanType::Basic));
}

#[tokio::test]
#[ignore = "probes all 65535 loopback ports"]
async fn aggressive_scan_covers_full_range() {
    let port = spawn_greeter(b"hello\r\n").await;
    let scanner = Scanner::new(fast_config().with_concurrency(256));
    let req = ScanRequest::parse("127.0.0.1", "aggressive").unwrap();
    let result = scanner.scan(&req).await.unwrap();

    assert_eq!(result.total_ports_scanned, 65535);
    assert_invariants(&result, PortRange::for_scan_type(ScanType::Aggressive));
    assert!(result.open_ports.iter().any(|o| o.port == port));
}

#[tokio::test]
async fn unknown_scan_type_is_invalid_input() {
    let err = ScanRequest::parse("127.0.0.1", "turbo").unwrap_err();
    assert!(matches!(err, ScanError::InvalidInput(_)));
}

#[tokio::test]
async fn malformed_host_is_invalid_input() {
    let scanner = Scanner::new(fast_config());
    for host in ["", "not a host", "999.1.1.1", "-x.com"] {
        let req = ScanRequest::new(host, ScanType::Basic);
        let err = scanner.scan(&req).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidInput(_)), "{host:?}: {err}");
    }
}

#[tokio::test]
async fn unresolvable_domain_is_resolution_error() {
    let scanner = Scanner::new(fast_config().with_resolve_timeout(Duration::from_secs(5)));
    let req = ScanRequest::new("this-domain-does-not-exist-xyz123.invalid", ScanType::Basic);
    let err = scanner.scan(&req).await.unwrap_err();
    assert!(matches!(err, ScanError::Resolution { .. }), "{err}");
}

#[tokio::test]
async fn concurrent_scans_do_not_share_results() {
    let port_a = spawn_greeter(b"alpha\r\n").await;
    let port_b = spawn_greeter(b"bravo\r\n").await;

    let resolver: Arc<dyn Resolve> = Arc::new(
        StaticResolver::new()
            .with_entry("alpha.test", LOCALHOST)
            .with_entry("bravo.test", LOCALHOST),
    );
    let scanner = Scanner::with_resolver(fast_config(), resolver);

    let range_a = PortRange::new(port_a, port_a).unwrap();
    let range_b = PortRange::new(port_b, port_b).unwrap();
    let req_a = ScanRequest::new("alpha.test", ScanType::Basic);
    let req_b = ScanRequest::new("bravo.test", ScanType::Basic);

    let (a, b) = tokio::join!(
        scanner.scan_range(&req_a, range_a),
        scanner.scan_range(&req_b, range_b)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.host, "alpha.test");
    assert_eq!(b.host, "bravo.test");
    assert_eq!(a.open_ports.len(), 1);
    assert_eq!(b.open_ports.len(), 1);
    assert_eq!(a.open_ports[0].port, port_a);
    assert_eq!(a.open_ports[0].banner, "alpha");
    assert_eq!(b.open_ports[0].port, port_b);
    assert_eq!(b.open_ports[0].banner, "bravo");
}

#[tokio::test]
async fn pool_runs_probes_in_parallel() {
    let timeout = Duration::from_millis(200);
    let cfg = fast_config()
        .with_concurrency(128)
        .with_connect_timeout(timeout);
    let scanner = Scanner::new(cfg);

    // High, rarely used ports on loopback: nearly all refuse immediately.
    let range = PortRange::new(61000, 61511).unwrap();
    let req = ScanRequest::new("127.0.0.1", ScanType::Basic);

    let started = Instant::now();
    let result = scanner.scan_range(&req, range).await.unwrap();
    let wall = started.elapsed();

    let sequential_worst_case = timeout * range.len() as u32;
    assert!(result.elapsed <= wall);
    assert!(
        result.elapsed < sequential_worst_case / 10,
        "elapsed {:?} vs sequential worst case {:?}",
        result.elapsed,
        sequential_worst_case
    );
    assert_invariants(&result, range);
}
