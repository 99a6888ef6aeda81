use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rsntp::AsyncSntpClient;

use super::{Probe, Reading};
use crate::registry::Target;

/// Single SNTP exchange with a time server. A decodable time response is
/// proof of reachability; the server time lands in the note for the
/// presenter.
pub struct NtpProbe {
    timeout: Duration,
}

impl NtpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for NtpProbe {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

#[async_trait]
impl Probe for NtpProbe {
    async fn check(&self, target: &Target) -> Result<Reading> {
        let mut client = AsyncSntpClient::new();
        client.set_timeout(self.timeout);

        let result = client
            .synchronize(target.address.as_str())
            .await
            .map_err(|error| anyhow!("SNTP query failed: {error}"))?;

        let server_time: DateTime<Utc> = result
            .datetime()
            .into_chrono_datetime()
            .map_err(|error| anyhow!("server returned an invalid timestamp: {error}"))?;

        Ok(Reading::ok_with(format!(
            "server time {}",
            server_time.format("%Y-%m-%d %H:%M:%S UTC")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Family, Params};
    use crate::types::Classification;

    // Requires network access.
    #[tokio::test]
    #[ignore]
    async fn queries_a_public_time_server() {
        let target = Target {
            name: "pool.ntp.org".to_string(),
            family: Family::NtpServers,
            address: "pool.ntp.org".to_string(),
            port: None,
            params: Params::None,
        };
        let probe = NtpProbe::default();
        let reading = probe.check(&target).await.expect("query succeeds");
        assert_eq!(reading.classification, Classification::Ok);
        assert!(reading.note.expect("note").starts_with("server time "));
    }
}
