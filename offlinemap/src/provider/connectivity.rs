//! Network reachability probes.

use std::time::Duration;

use tokio::net::TcpStream;
use tracing::debug;

use crate::BoxFuture;

/// Answers whether the network is reachable at all.
pub trait Connectivity: Send + Sync {
    fn is_available(&self) -> BoxFuture<'_, bool>;
}

/// Probe that always reports the network as reachable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeOnline;

impl Connectivity for AssumeOnline {
    fn is_available(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { true })
    }
}

/// Probe that opens a TCP connection to the tile server.
#[derive(Debug, Clone)]
pub struct TcpConnectivity {
    address: String,
    timeout: Duration,
}

impl TcpConnectivity {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Builds a probe for the host and port of `url`.
    pub fn for_url(url: &str, timeout: Duration) -> Option<Self> {
        let parsed = reqwest::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port_or_known_default()?;
        Some(Self::new(format!("{}:{}", host, port), timeout))
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl Connectivity for TcpConnectivity {
    fn is_available(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    debug!(address = %self.address, error = %e, "Connectivity probe failed");
                    false
                }
                Err(_) => {
                    debug!(address = %self.address, "Connectivity probe timed out");
                    false
                }
            }
        })
    }
}
