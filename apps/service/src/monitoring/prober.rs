use std::net::{IpAddr, SocketAddr};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

/// Transport used to decide reachability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Icmp,
    Tcp,
    Http,
}

impl std::fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeKind::Icmp => write!(f, "icmp"),
            ProbeKind::Tcp => write!(f, "tcp"),
            ProbeKind::Http => write!(f, "http"),
        }
    }
}

/// Reachability check against a single address.
///
/// Implementations never report transport errors: anything that goes wrong
/// while probing means the address is unreachable.
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, address: &str) -> bool;
}

/// Build the prober for `kind`, bounded by `timeout_duration`
pub fn build_prober(kind: ProbeKind, timeout_duration: Duration) -> Result<Arc<dyn Prober>> {
    Ok(match kind {
        ProbeKind::Icmp => Arc::new(IcmpProber::new(timeout_duration)),
        ProbeKind::Tcp => Arc::new(TcpProber::new(timeout_duration)),
        ProbeKind::Http => Arc::new(HttpProber::new(timeout_duration)?),
    })
}

/// Sends one echo request through the system `ping`
pub struct IcmpProber {
    timeout_duration: Duration,
}

impl IcmpProber {
    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }

    async fn ping(&self, address: &str) -> Result<()> {
        let count_flag = if cfg!(windows) { "-n" } else { "-c" };

        let status = Command::new("ping")
            .args([count_flag, "1", address])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        let status = timeout(self.timeout_duration, status)
            .await
            .map_err(|_| anyhow!("ping timed out"))?
            .map_err(|e| anyhow!("failed to run ping: {}", e))?;

        if status.success() { Ok(()) } else { Err(anyhow!("ping exited with {}", status)) }
    }
}

#[async_trait::async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, address: &str) -> bool {
        match self.ping(address).await {
            Ok(()) => true,
            Err(e) => {
                debug!(address, error = %e, "ICMP probe failed");
                false
            }
        }
    }
}

/// TCP connect checker
pub struct TcpProber {
    timeout_duration: Duration,
}

impl TcpProber {
    pub const DEFAULT_PORT: u16 = 80;

    pub fn new(timeout_duration: Duration) -> Self {
        Self { timeout_duration }
    }

    async fn connect(&self, address: &str) -> Result<()> {
        let target = with_default_port(address, Self::DEFAULT_PORT);
        let connect = tokio::net::TcpStream::connect(target);

        timeout(self.timeout_duration, connect)
            .await
            .map_err(|_| anyhow!("TCP connection timeout"))?
            .map_err(|e| anyhow!("TCP connection failed: {}", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl Prober for TcpProber {
    async fn probe(&self, address: &str) -> bool {
        match self.connect(address).await {
            Ok(()) => true,
            Err(e) => {
                debug!(address, error = %e, "TCP probe failed");
                false
            }
        }
    }
}

/// HTTP GET checker, 2xx and 3xx count as reachable
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout_duration: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout_duration).build()?;

        Ok(Self { client })
    }

    async fn get(&self, address: &str) -> Result<()> {
        let url = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{address}")
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("HTTP request failed: {}", e))?;

        let status = response.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(anyhow!("HTTP check failed with status code: {}", status.as_u16()))
        }
    }
}

#[async_trait::async_trait]
impl Prober for HttpProber {
    async fn probe(&self, address: &str) -> bool {
        match self.get(address).await {
            Ok(()) => true,
            Err(e) => {
                debug!(address, error = %e, "HTTP probe failed");
                false
            }
        }
    }
}

/// Append `port` unless `address` already names one
fn with_default_port(address: &str, port: u16) -> String {
    if address.parse::<SocketAddr>().is_ok() {
        return address.to_string();
    }

    if let Ok(ip) = address.parse::<IpAddr>() {
        return SocketAddr::new(ip, port).to_string();
    }

    match address.rsplit_once(':') {
        Some((host, raw_port)) if !host.contains(':') && raw_port.parse::<u16>().is_ok() => {
            address.to_string()
        }
        _ => format!("{address}:{port}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_default_port() {
        assert_eq!(with_default_port("example.com", 80), "example.com:80");
        assert_eq!(with_default_port("example.com:8080", 80), "example.com:8080");
        assert_eq!(with_default_port("10.0.0.1", 443), "10.0.0.1:443");
        assert_eq!(with_default_port("10.0.0.1:22", 80), "10.0.0.1:22");
        assert_eq!(with_default_port("::1", 80), "[::1]:80");
        assert_eq!(with_default_port("[::1]:8443", 80), "[::1]:8443");
    }

    #[tokio::test]
    async fn test_tcp_probe_reaches_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let prober = TcpProber::new(Duration::from_secs(2));
        assert!(prober.probe(&address).await);
    }

    #[tokio::test]
    async fn test_tcp_probe_failure_is_unreachable() {
        // Bind then drop so the port is very likely closed
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let prober = TcpProber::new(Duration::from_secs(2));
        assert!(!prober.probe(&address).await);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_unreachable() {
        let prober = TcpProber::new(Duration::from_secs(2));
        assert!(!prober.probe("does-not-exist.invalid").await);
    }

    #[test]
    fn test_probe_kind_display() {
        assert_eq!(ProbeKind::default().to_string(), "icmp");
        assert_eq!(ProbeKind::Http.to_string(), "http");
    }
}
