//! External IP discovery and reputation lookup.
//!
//! The discovered address is a fact worth remembering between runs: a
//! change usually means the ISP re-assigned the line, which puts earlier
//! latency observations in a different context.

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::cache::Cache;
use crate::error::CacheError;

/// Cache key holding the address seen on the previous run
pub const LAST_IP_KEY: &str = "last_external_ip";
/// Cache key the host provisions with an AbuseIPDB API key
pub const ABUSE_API_KEY: &str = "abuseipdb_api_key";

/// Echo services tried in order; the first parseable answer wins
const IP_ECHO_SERVICES: [&str; 4] = [
    "https://api.ipify.org?format=json",
    "https://ifconfig.me/ip",
    "https://icanhazip.com",
    "https://ident.me",
];

/// Ask public echo services for the address this connection appears as.
pub async fn discover_external_ip() -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("building IP echo client failed")?;

    for service in IP_ECHO_SERVICES {
        match fetch_ip(&client, service).await {
            Ok(address) => return Ok(address),
            Err(error) => debug!(service, "echo service failed: {error:#}"),
        }
    }
    bail!("could not determine external IP (all echo services failed)")
}

async fn fetch_ip(client: &reqwest::Client, service: &str) -> Result<String> {
    let response = client.get(service).send().await?.error_for_status()?;
    let address = if service.contains("ipify") {
        let body: Value = response.json().await?;
        body.get("ip")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("malformed ipify response"))?
    } else {
        response.text().await?.trim().to_string()
    };
    if address.is_empty() {
        bail!("empty response from {service}");
    }
    Ok(address)
}

/// Store the discovered address, returning the previous one when it
/// differs (i.e. the line was re-assigned since the last run).
pub fn remember_external_ip(
    cache: &mut dyn Cache,
    address: &str,
) -> Result<Option<String>, CacheError> {
    let previous = cache
        .get(LAST_IP_KEY)
        .and_then(|value| value.as_str().map(str::to_owned));
    cache.set(LAST_IP_KEY, Value::String(address.to_string()))?;
    Ok(previous.filter(|known| known != address))
}

/// The fields of an AbuseIPDB check we report on
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpReputation {
    pub ip_address: String,
    pub abuse_confidence_score: u8,
    pub total_reports: u64,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub isp: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub last_reported_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AbuseEnvelope {
    data: IpReputation,
}

/// Query AbuseIPDB for the reputation of an address. The API key comes
/// from the cache collaborator ([`ABUSE_API_KEY`]); callers are expected
/// to skip the lookup when no key is provisioned.
pub async fn check_ip_reputation(address: &str, api_key: &str) -> Result<IpReputation> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("building reputation client failed")?;

    let response = client
        .get("https://api.abuseipdb.com/api/v2/check")
        .header("Key", api_key)
        .header("Accept", "application/json")
        .query(&[("ipAddress", address), ("maxAgeInDays", "90")])
        .send()
        .await
        .context("AbuseIPDB request failed")?
        .error_for_status()
        .context("AbuseIPDB rejected the request")?;

    let envelope: AbuseEnvelope =
        response.json().await.context("malformed AbuseIPDB response")?;
    Ok(envelope.data)
}

/// Human-readable reputation summary for the presenter
pub fn summarize_reputation(reputation: &IpReputation) -> String {
    let mut summary = String::new();
    let _ = writeln!(summary, "Reputation of {}:", reputation.ip_address);
    let _ = writeln!(
        summary,
        "  abuse confidence score: {}%",
        reputation.abuse_confidence_score
    );
    let _ = writeln!(summary, "  total reports (90 days): {}", reputation.total_reports);
    if let Some(country) = &reputation.country_code {
        let _ = writeln!(summary, "  country: {country}");
    }
    if let Some(isp) = &reputation.isp {
        let _ = writeln!(summary, "  isp: {isp}");
    }
    if let Some(domain) = &reputation.domain {
        let _ = writeln!(summary, "  domain: {domain}");
    }
    match &reputation.last_reported_at {
        Some(when) => {
            let _ = writeln!(summary, "  last reported: {when}");
        }
        None => {
            let _ = writeln!(summary, "  last reported: never");
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::JsonFileCache;
    use serde_json::json;

    #[test]
    fn remember_reports_a_change_only_when_the_address_moved() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut cache = JsonFileCache::open(dir.path().join("cache.json")).expect("open");

        // First sighting: nothing to compare against.
        assert_eq!(remember_external_ip(&mut cache, "203.0.113.7").expect("set"), None);
        // Same address again: no change reported.
        assert_eq!(remember_external_ip(&mut cache, "203.0.113.7").expect("set"), None);
        // New address: previous one comes back.
        assert_eq!(
            remember_external_ip(&mut cache, "198.51.100.23").expect("set"),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn abuse_response_parses_and_summarizes() {
        let payload = json!({
            "data": {
                "ipAddress": "203.0.113.7",
                "abuseConfidenceScore": 3,
                "totalReports": 2,
                "countryCode": "US",
                "isp": "Example Networks",
                "domain": "example.net",
                "lastReportedAt": "2025-11-02T10:00:00+00:00"
            }
        });
        let envelope: AbuseEnvelope = serde_json::from_value(payload).expect("parses");
        let summary = summarize_reputation(&envelope.data);
        assert!(summary.contains("203.0.113.7"));
        assert!(summary.contains("3%"));
        assert!(summary.contains("Example Networks"));
    }

    #[test]
    fn sparse_abuse_response_still_parses() {
        let payload = json!({
            "data": {
                "ipAddress": "203.0.113.7",
                "abuseConfidenceScore": 0,
                "totalReports": 0
            }
        });
        let envelope: AbuseEnvelope = serde_json::from_value(payload).expect("parses");
        assert!(summarize_reputation(&envelope.data).contains("last reported: never"));
    }
}
