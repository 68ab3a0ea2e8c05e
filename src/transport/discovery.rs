//! Coordination server discovery
//!
//! Best-effort scan of common private address ranges on the candidate
//! signaling port(s), used once at startup to resolve the server URL
//! before the socket connects. Probes run in fixed-size batches with a
//! short per-probe timeout, and the whole scan is bounded by a hard
//! deadline — a fruitless scan returns `None`, it never spins forever.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Discovery scan options
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Candidate signaling ports, in preference order
    pub ports: Vec<u16>,

    /// Subnets to sweep, as `a.b.c` /24 prefixes
    pub subnets: Vec<String>,

    /// Per-probe connect timeout
    pub probe_timeout: Duration,

    /// Probes issued concurrently
    pub batch_size: usize,

    /// Hard ceiling on the whole scan
    pub max_scan_duration: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ports: vec![8787],
            subnets: vec!["192.168.0".into(), "192.168.1".into(), "10.0.0".into()],
            probe_timeout: Duration::from_millis(300),
            batch_size: 10,
            max_scan_duration: Duration::from_secs(8),
        }
    }
}

impl DiscoveryConfig {
    /// Set the candidate ports
    pub fn ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Set the subnets to sweep
    pub fn subnets(mut self, subnets: Vec<String>) -> Self {
        self.subnets = subnets;
        self
    }

    /// Set the per-probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Set the overall scan deadline
    pub fn max_scan_duration(mut self, max: Duration) -> Self {
        self.max_scan_duration = max;
        self
    }
}

/// Outcome of a discovery scan
#[derive(Debug, Clone)]
pub struct DiscoveryResult {
    /// First reachable server, as a ws:// URL
    pub url: Option<String>,
    /// Addresses probed before the scan ended
    pub probed: usize,
}

/// Scan for a reachable coordination server.
///
/// Returns as soon as one probe succeeds. A scan that exhausts its
/// candidates or hits the deadline reports how far it got.
pub async fn discover_server(config: &DiscoveryConfig) -> DiscoveryResult {
    let candidates = candidate_addrs(config);
    let total = candidates.len();

    let scan = scan_batches(&candidates, config);
    match timeout(config.max_scan_duration, scan).await {
        Ok((found, probed)) => DiscoveryResult {
            url: found.map(|addr| format!("ws://{}/ws", addr)),
            probed,
        },
        Err(_) => {
            tracing::warn!(
                candidates = total,
                "Discovery scan deadline reached without a hit"
            );
            DiscoveryResult {
                url: None,
                probed: total,
            }
        }
    }
}

/// Probe a single known address, bypassing the sweep.
pub async fn probe(addr: SocketAddr, probe_timeout: Duration) -> bool {
    matches!(timeout(probe_timeout, TcpStream::connect(addr)).await, Ok(Ok(_)))
}

fn candidate_addrs(config: &DiscoveryConfig) -> Vec<SocketAddr> {
    let mut addrs = Vec::new();
    for subnet in &config.subnets {
        for host in 1..=254u8 {
            let ip: Result<IpAddr, _> = format!("{}.{}", subnet, host).parse();
            let Ok(ip) = ip else { continue };
            for &port in &config.ports {
                addrs.push(SocketAddr::new(ip, port));
            }
        }
    }
    addrs
}

async fn scan_batches(
    candidates: &[SocketAddr],
    config: &DiscoveryConfig,
) -> (Option<SocketAddr>, usize) {
    let batch_size = config.batch_size.max(1);
    let mut probed = 0;

    for batch in candidates.chunks(batch_size) {
        let probes = batch
            .iter()
            .map(|&addr| async move { (addr, probe(addr, config.probe_timeout).await) });

        for (addr, reachable) in join_all(probes).await {
            probed += 1;
            if reachable {
                tracing::info!(server = %addr, probed = probed, "Coordination server found");
                return (Some(addr), probed);
            }
        }
    }

    (None, probed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_enumeration() {
        let config = DiscoveryConfig::default()
            .subnets(vec!["192.168.1".into()])
            .ports(vec![8787, 9090]);

        let addrs = candidate_addrs(&config);
        assert_eq!(addrs.len(), 254 * 2);
        assert_eq!(addrs[0], "192.168.1.1:8787".parse().unwrap());
    }

    #[tokio::test]
    async fn test_probe_finds_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        assert!(probe(addr, Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_scan_bounded_when_nothing_listens() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        // Loopback probes fail fast; the deadline is the backstop
        let config = DiscoveryConfig::default()
            .subnets(vec!["127.0.0".into()])
            .ports(vec![port])
            .probe_timeout(Duration::from_millis(50))
            .max_scan_duration(Duration::from_secs(3));

        let result = discover_server(&config).await;
        assert!(result.url.is_none());
        assert!(result.probed > 0);
    }

    #[tokio::test]
    async fn test_discover_reports_url() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = DiscoveryConfig::default()
            .subnets(vec!["127.0.0".into()])
            .ports(vec![addr.port()]);

        let result = discover_server(&config).await;
        assert_eq!(result.url, Some(format!("ws://127.0.0.1:{}/ws", addr.port())));
    }
}
