//! Upstream Proxy
//!
//! Relays queries no rule answers to a single upstream resolver over UDP.
//! The request and the response are passed through byte for byte.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::debug;

use crate::dns::wire::DNS_HEADER_SIZE;

/// Largest datagram accepted from the upstream
const MAX_UPSTREAM_RESPONSE: usize = 65535;

/// Upstream resolution failures
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream {0} did not answer within {1:?}")]
    Timeout(SocketAddr, Duration),

    #[error("upstream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Forwards raw queries to the configured upstream resolver
#[derive(Debug, Clone)]
pub struct UpstreamProxy {
    upstream: SocketAddr,
    timeout: Duration,
}

impl UpstreamProxy {
    pub fn new(upstream: SocketAddr, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    pub fn upstream(&self) -> SocketAddr {
        self.upstream
    }

    /// Send `request` upstream and return the matching response unmodified.
    ///
    /// Each call uses its own ephemeral socket so concurrent calls never
    /// share state. A single attempt is made, bounded by the timeout.
    pub async fn forward(&self, request: &[u8]) -> Result<Vec<u8>, ProxyError> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| ProxyError::Timeout(self.upstream, self.timeout))?
    }

    async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>, ProxyError> {
        let bind_addr: SocketAddr = match self.upstream {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };

        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(self.upstream).await?;
        socket.send(request).await?;

        let mut buf = vec![0u8; MAX_UPSTREAM_RESPONSE];
        loop {
            let len = socket.recv(&mut buf).await?;

            // Only the reply carrying our transaction ID completes the exchange
            if len >= DNS_HEADER_SIZE && request.len() >= 2 && buf[..2] == request[..2] {
                buf.truncate(len);
                return Ok(buf);
            }

            debug!("Ignoring stray {}-byte datagram from upstream {}", len, self.upstream);
        }
    }
}
