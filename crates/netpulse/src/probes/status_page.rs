use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;

use super::{Probe, Reading};
use crate::registry::{HealthRule, Params, Target};

/// Fetches a cloud provider's status page and evaluates its per-target
/// health rule against the raw HTML.
pub struct StatusPageProbe {
    client: Client,
}

impl StatusPageProbe {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .context("building status page client failed")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for StatusPageProbe {
    async fn check(&self, target: &Target) -> Result<Reading> {
        let Params::StatusPage(rule) = &target.params else {
            return Err(anyhow!("target {} has no health rule configured", target.name));
        };

        let response = self
            .client
            .get(&target.address)
            .timeout(target.family.timeout())
            .send()
            .await
            .with_context(|| format!("request to {} failed", target.address))?;

        let status = response.status();
        if !status.is_success() {
            return Ok(Reading::unreachable(format!("status {}", status.as_u16())));
        }

        let body = response.text().await.context("reading status page body failed")?;
        Ok(evaluate(rule, &body))
    }
}

/// Classify a 200 status page body. The page answered, so the outcome is
/// OK or DEGRADED, never UNREACHABLE.
fn evaluate(rule: &HealthRule, body: &str) -> Reading {
    match rule {
        HealthRule::BodyMarker { healthy } => {
            if body.contains(healthy.as_str()) {
                Reading::ok()
            } else {
                Reading::degraded("healthy marker not found; possible ongoing incident")
            }
        }
        HealthRule::IconRatio { icon_class, available_class, warning_class } => {
            let total = body.matches(icon_class.as_str()).count();
            if total == 0 {
                return Reading::degraded("unable to determine status (no status icons found)");
            }
            let available = body.matches(available_class.as_str()).count();
            let warnings = body.matches(warning_class.as_str()).count();
            let pct_available = available as f64 / total as f64 * 100.0;
            let pct_warning = warnings as f64 / total as f64 * 100.0;

            if pct_available >= 99.0 && pct_warning <= 1.0 {
                Reading::ok()
            } else if pct_warning > 1.0 {
                Reading::degraded(format!(
                    "{pct_warning:.1}% services with warnings, {pct_available:.1}% fully available"
                ))
            } else {
                Reading::degraded(format!(
                    "only {pct_available:.1}% services fully available"
                ))
            }
        }
    }
}
