//! Runs every requested family through the retry orchestrator and merges
//! the per-target outcomes into one report.
//!
//! Families are independent: they run concurrently, a family whose probe
//! cannot even be constructed still contributes a complete report of
//! UNREACHABLE outcomes, and the final family order is the requested
//! order, never completion order.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::config::Config;
use crate::probes::{
    DnsProbe, HttpProbe, NtpProbe, Probe, Reading, StatusPageProbe, TcpProbe, WhoisProbe,
};
use crate::registry::{Family, Registry, Target};
use crate::retry::{RetryPolicy, run_with_retry};
use crate::types::{AggregateReport, FamilyReport, ProbeOutcome};

/// Everything needed to probe one family
pub struct FamilyPlan {
    pub family: Family,
    pub targets: Vec<Target>,
    pub probe: Arc<dyn Probe>,
    pub policy: RetryPolicy,
}

/// Run every plan and merge the outcomes, preserving plan order.
///
/// Pure orchestration: all network I/O happens inside the probes. Only
/// programmer errors can escape; per-target failures are already encoded
/// in the outcomes.
pub async fn aggregate(plans: Vec<FamilyPlan>, limiter: Arc<Semaphore>) -> AggregateReport {
    let mut handles = Vec::with_capacity(plans.len());
    let mut fallbacks: Vec<(Family, Vec<Target>)> = Vec::with_capacity(plans.len());

    for plan in plans {
        fallbacks.push((plan.family, plan.targets.clone()));
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move {
            let started = std::time::Instant::now();
            let outcomes =
                run_with_retry(plan.probe, &plan.targets, plan.policy, limiter).await;
            let report = FamilyReport::new(plan.family, outcomes);
            info!(
                family = %plan.family,
                reachable = report.reachable_count(),
                total = report.total(),
                elapsed_s = started.elapsed().as_secs(),
                "family probed"
            );
            report
        }));
    }

    let mut reports = Vec::with_capacity(fallbacks.len());
    for ((family, targets), handle) in fallbacks.into_iter().zip(join_all(handles).await) {
        let report = match handle {
            Ok(report) => report,
            Err(error) => {
                warn!(%family, "family task failed: {error}");
                FamilyReport::new(
                    family,
                    targets
                        .iter()
                        .map(|target| {
                            ProbeOutcome::unreachable(
                                target,
                                Duration::ZERO,
                                format!("family task failed: {error}"),
                            )
                        })
                        .collect(),
                )
            }
        };
        reports.push(report);
    }

    AggregateReport::new(reports)
}

/// Stand-in for a probe whose construction failed; every target in the
/// family reports the constructor error instead of vanishing.
struct UnavailableProbe {
    cause: String,
}

#[async_trait]
impl Probe for UnavailableProbe {
    async fn check(&self, _target: &Target) -> Result<Reading> {
        Ok(Reading::unreachable(format!("probe unavailable: {}", self.cause)))
    }
}

/// The batch engine: builtin (or caller-supplied) registry, per-family
/// probes, shared concurrency limit.
pub struct Engine {
    registry: Registry,
    config: Config,
    limiter: Arc<Semaphore>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, Registry::builtin())
    }

    pub fn with_registry(config: Config, registry: Registry) -> Self {
        let limiter = Arc::new(Semaphore::new(config.probes.concurrency.max(1)));
        Self { registry, config, limiter }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// One batch pass over every registered family
    pub async fn run_all(&self) -> AggregateReport {
        self.run(&Family::ALL).await
    }

    /// One batch pass over the selected families, reported in the given
    /// order.
    pub async fn run(&self, families: &[Family]) -> AggregateReport {
        let plans = families.iter().map(|&family| self.plan_for(family)).collect();
        aggregate(plans, Arc::clone(&self.limiter)).await
    }

    fn plan_for(&self, family: Family) -> FamilyPlan {
        let targets = self.registry.targets(family).to_vec();
        match self.probe_for(family) {
            Ok(probe) => FamilyPlan {
                family,
                targets,
                probe,
                policy: RetryPolicy::new(family.retries(), self.config.retry_delay()),
            },
            Err(error) => {
                warn!(%family, "building probe failed: {error:#}");
                // No point delaying retries that cannot succeed.
                FamilyPlan {
                    family,
                    targets,
                    probe: Arc::new(UnavailableProbe { cause: format!("{error:#}") }),
                    policy: RetryPolicy::none(),
                }
            }
        }
    }

    fn probe_for(&self, family: Family) -> Result<Arc<dyn Probe>> {
        Ok(match family {
            Family::DnsResolvers | Family::DnsRootServers => {
                Arc::new(DnsProbe::new(&self.config.dns.reference_domain))
            }
            Family::SmtpServers | Family::ImapServers => Arc::new(TcpProbe::default()),
            Family::WhoisServers => Arc::new(WhoisProbe::new(&self.config.whois.binary)),
            Family::NtpServers => Arc::new(NtpProbe::default()),
            Family::CloudStatus => Arc::new(StatusPageProbe::new(&self.config.http.user_agent)?),
            Family::Websites
            | Family::CdnEndpoints
            | Family::CertificateAuthorities
            | Family::IxpEndpoints => Arc::new(HttpProbe::new(&self.config.http.user_agent)?),
        })
    }
}
