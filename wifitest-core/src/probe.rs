use crate::traits::ReachabilityProbe;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// 默认探测目标：公共 DNS 的 53 端口
const DEFAULT_TARGET: ([u8; 4], u16) = ([8, 8, 8, 8], 53);

/// Internet reachability via a short outbound TCP connect.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    target: SocketAddr,
    timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            target: SocketAddr::from(DEFAULT_TARGET),
            timeout: Duration::from_secs(3),
        }
    }
}

impl TcpProbe {
    pub fn new(target: SocketAddr, timeout: Duration) -> Self {
        Self { target, timeout }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn has_internet(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(target = %self.target, error = %e, "reachability probe failed");
                false
            }
            Err(_) => {
                tracing::debug!(target = %self.target, "reachability probe timed out");
                false
            }
        }
    }
}
