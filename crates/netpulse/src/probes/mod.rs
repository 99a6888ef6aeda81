//! One probe per protocol family.
//!
//! Every probe performs a single stateless reachability attempt and
//! classifies the immediate outcome. Network errors never cross the probe
//! boundary: [`observe`] times each attempt and converts failures into
//! `UNREACHABLE` outcomes, so one bad target cannot abort a batch.

use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;

use crate::registry::Target;
use crate::types::{Classification, ProbeOutcome};

pub mod dns;
pub mod http;
pub mod ntp;
pub mod status_page;
pub mod tcp;
pub mod whois;

pub use dns::DnsProbe;
pub use http::HttpProbe;
pub use ntp::NtpProbe;
pub use status_page::StatusPageProbe;
pub use tcp::TcpProbe;
pub use whois::WhoisProbe;

/// What a single attempt observed, before timing is attached
#[derive(Debug, Clone)]
pub struct Reading {
    pub classification: Classification,
    pub note: Option<String>,
}

impl Reading {
    pub fn ok() -> Self {
        Self { classification: Classification::Ok, note: None }
    }

    pub fn ok_with(note: impl Into<String>) -> Self {
        Self { classification: Classification::Ok, note: Some(note.into()) }
    }

    pub fn degraded(note: impl Into<String>) -> Self {
        Self { classification: Classification::Degraded, note: Some(note.into()) }
    }

    /// A classified failure, as opposed to an error escaping `check`
    pub fn unreachable(note: impl Into<String>) -> Self {
        Self { classification: Classification::Unreachable, note: Some(note.into()) }
    }
}

/// A single reachability attempt against one target
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, target: &Target) -> Result<Reading>;
}

/// Slack added on top of the target timeout before an attempt is abandoned
/// outright. Probes carry their own timeouts; this outer deadline guards
/// against ones that hang past them (a stuck child process, a stalled TLS
/// handshake).
const DEADLINE_GRACE: Duration = Duration::from_secs(5);

/// Run one probe attempt, recording wall-clock time regardless of outcome.
pub async fn observe(probe: &dyn Probe, target: &Target) -> ProbeOutcome {
    let deadline = target.timeout() + DEADLINE_GRACE;
    let start = Instant::now();
    let attempt = tokio::time::timeout(deadline, probe.check(target)).await;
    let elapsed = start.elapsed();

    match attempt {
        Ok(Ok(reading)) => ProbeOutcome::new(target, reading.classification, elapsed, reading.note),
        Ok(Err(error)) => ProbeOutcome::unreachable(target, elapsed, format!("{error:#}")),
        Err(_) => ProbeOutcome::unreachable(
            target,
            elapsed,
            format!("probe timed out after {}s", deadline.as_secs()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Family, Params};
    use anyhow::anyhow;

    struct FixedProbe(Result<Reading, String>);

    #[async_trait]
    impl Probe for FixedProbe {
        async fn check(&self, _target: &Target) -> Result<Reading> {
            match &self.0 {
                Ok(reading) => Ok(reading.clone()),
                Err(message) => Err(anyhow!("{message}")),
            }
        }
    }

    fn target() -> Target {
        Target {
            name: "example".to_string(),
            family: Family::Websites,
            address: "https://example.invalid".to_string(),
            port: None,
            params: Params::None,
        }
    }

    #[tokio::test]
    async fn observe_converts_errors_into_unreachable() {
        let probe = FixedProbe(Err("connection refused".to_string()));
        let outcome = observe(&probe, &target()).await;
        assert_eq!(outcome.classification, Classification::Unreachable);
        assert!(outcome.detail.as_deref().expect("detail set").contains("connection refused"));
    }

    #[tokio::test]
    async fn observe_is_idempotent_for_healthy_targets() {
        let probe = FixedProbe(Ok(Reading::ok()));
        let t = target();
        for _ in 0..2 {
            let outcome = observe(&probe, &t).await;
            assert_eq!(outcome.classification, Classification::Ok);
            assert!(outcome.reachable);
        }
    }

    #[tokio::test]
    async fn observe_preserves_degraded_notes() {
        let probe = FixedProbe(Ok(Reading::degraded("redirected (status 301)")));
        let outcome = observe(&probe, &target()).await;
        assert_eq!(outcome.classification, Classification::Degraded);
        assert!(outcome.reachable);
        assert_eq!(outcome.detail.as_deref(), Some("redirected (status 301)"));
    }
}
