use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{Probe, Reading};
use crate::registry::Target;

/// Plain TCP connect, used for SMTP and IMAP reachability. A completed
/// handshake is enough; no protocol banner is read.
pub struct TcpProbe {
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self, target: &Target) -> Result<Reading> {
        let port = target
            .port
            .ok_or_else(|| anyhow!("target {} has no port configured", target.name))?;

        let connect = TcpStream::connect((target.address.as_str(), port));
        timeout(self.timeout, connect)
            .await
            .map_err(|_| anyhow!("connection timed out after {}s", self.timeout.as_secs()))?
            .with_context(|| format!("connect to {}:{} failed", target.address, port))?;

        Ok(Reading::ok())
    }
}
