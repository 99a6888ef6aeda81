//! Bounded-retry orchestration over one family's target list.
//!
//! A pass probes targets concurrently under the shared limiter and writes
//! each outcome into a slot indexed by target position, so the final list
//! is always in registry order no matter when individual probes finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::probes::{Probe, observe};
use crate::registry::Target;
use crate::types::ProbeOutcome;

/// How often and how patiently failed targets are re-probed
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts granted to targets that were not OK
    pub retries: u32,
    /// Pause before each retry pass
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Single attempt, no second chances
    pub fn none() -> Self {
        Self { retries: 0, delay: Duration::ZERO }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { retries: 1, delay: Duration::from_secs(5) }
    }
}

/// Probe every target once, then re-probe only the failed subset until the
/// policy is exhausted or everything is OK. The last attempt wins; no
/// outcome history is kept. Targets that were OK on the first pass are
/// never probed again.
pub async fn run_with_retry(
    probe: Arc<dyn Probe>,
    targets: &[Target],
    policy: RetryPolicy,
    limiter: Arc<Semaphore>,
) -> Vec<ProbeOutcome> {
    if targets.is_empty() {
        return Vec::new();
    }

    let mut slots: Vec<Option<ProbeOutcome>> = vec![None; targets.len()];
    let everything: Vec<usize> = (0..targets.len()).collect();
    probe_pass(&probe, targets, &everything, &limiter, &mut slots).await;

    let mut remaining = policy.retries;
    while remaining > 0 {
        let failed: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| !slot.as_ref().is_some_and(ProbeOutcome::is_ok))
            .map(|(index, _)| index)
            .collect();
        if failed.is_empty() {
            break;
        }

        debug!(failed = failed.len(), delay_s = policy.delay.as_secs(), "retrying failed targets");
        tokio::time::sleep(policy.delay).await;
        probe_pass(&probe, targets, &failed, &limiter, &mut slots).await;
        remaining -= 1;
    }

    slots
        .into_iter()
        .map(|slot| slot.expect("every slot is filled by the first pass"))
        .collect()
}

async fn probe_pass(
    probe: &Arc<dyn Probe>,
    targets: &[Target],
    indices: &[usize],
    limiter: &Arc<Semaphore>,
    slots: &mut [Option<ProbeOutcome>],
) {
    let mut handles: Vec<(usize, JoinHandle<ProbeOutcome>)> = Vec::with_capacity(indices.len());
    for &index in indices {
        let probe = Arc::clone(probe);
        let limiter = Arc::clone(limiter);
        let target = targets[index].clone();
        let handle = tokio::spawn(async move {
            let _permit = limiter.acquire_owned().await.expect("probe limiter never closes");
            observe(probe.as_ref(), &target).await
        });
        handles.push((index, handle));
    }

    for (index, handle) in handles {
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            // A panicked probe task must not cost the target its report slot.
            Err(error) => ProbeOutcome::unreachable(
                &targets[index],
                Duration::ZERO,
                format!("probe task failed: {error}"),
            ),
        };
        slots[index] = Some(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::Reading;
    use crate::registry::{Family, Params};
    use crate::types::Classification;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `fail_first[name]` attempts per target, then succeeds.
    struct ScriptedProbe {
        calls: AtomicUsize,
        fail_first: HashMap<String, u32>,
        attempts: Mutex<HashMap<String, u32>>,
    }

    impl ScriptedProbe {
        fn new(fail_first: &[(&str, u32)]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_first: fail_first
                    .iter()
                    .map(|(name, n)| (name.to_string(), *n))
                    .collect(),
                attempts: Mutex::new(HashMap::new()),
            }
        }

        fn attempts_for(&self, name: &str) -> u32 {
            self.attempts.lock().expect("lock").get(name).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl Probe for ScriptedProbe {
        async fn check(&self, target: &Target) -> anyhow::Result<Reading> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let attempt = {
                let mut attempts = self.attempts.lock().expect("lock");
                let entry = attempts.entry(target.name.clone()).or_insert(0);
                *entry += 1;
                *entry
            };
            let failures = self.fail_first.get(&target.name).copied().unwrap_or(0);
            if attempt <= failures {
                Err(anyhow!("simulated failure on attempt {attempt}"))
            } else {
                Ok(Reading::ok())
            }
        }
    }

    fn targets(names: &[&str]) -> Vec<Target> {
        names
            .iter()
            .map(|name| Target {
                name: name.to_string(),
                family: Family::DnsResolvers,
                address: "192.0.2.1".to_string(),
                port: None,
                params: Params::None,
            })
            .collect()
    }

    fn quick_policy(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::from_millis(10))
    }

    fn limiter() -> Arc<Semaphore> {
        Arc::new(Semaphore::new(4))
    }

    #[tokio::test]
    async fn failed_target_recovers_on_retry() {
        // R2 fails once then succeeds: 3 first-pass probes + 1 retry = 4 calls.
        let probe = Arc::new(ScriptedProbe::new(&[("R2", 1)]));
        let targets = targets(&["R1", "R2", "R3"]);

        let outcomes =
            run_with_retry(probe.clone(), &targets, quick_policy(1), limiter()).await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(ProbeOutcome::is_ok));
        assert_eq!(
            outcomes.iter().map(|o| o.target.as_str()).collect::<Vec<_>>(),
            vec!["R1", "R2", "R3"]
        );
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn healthy_targets_are_not_reprobed() {
        let probe = Arc::new(ScriptedProbe::new(&[("R2", 5)]));
        let targets = targets(&["R1", "R2", "R3"]);

        let outcomes =
            run_with_retry(probe.clone(), &targets, quick_policy(1), limiter()).await;

        assert_eq!(probe.attempts_for("R1"), 1);
        assert_eq!(probe.attempts_for("R3"), 1);
        // retry_count + 1 total attempts for the persistent failure
        assert_eq!(probe.attempts_for("R2"), 2);
        assert_eq!(outcomes[1].classification, Classification::Unreachable);
        assert!(outcomes[0].is_ok() && outcomes[2].is_ok());
    }

    #[tokio::test]
    async fn zero_retries_means_a_single_pass() {
        let probe = Arc::new(ScriptedProbe::new(&[("R1", 1)]));
        let targets = targets(&["R1", "R2"]);

        let outcomes =
            run_with_retry(probe.clone(), &targets, RetryPolicy::none(), limiter()).await;

        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes[0].classification, Classification::Unreachable);
        assert!(outcomes[1].is_ok());
    }

    #[tokio::test]
    async fn empty_target_list_returns_empty() {
        let probe = Arc::new(ScriptedProbe::new(&[]));
        let outcomes =
            run_with_retry(probe, &[], RetryPolicy::default(), limiter()).await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn multiple_retries_stop_once_everything_is_ok() {
        let probe = Arc::new(ScriptedProbe::new(&[("R1", 2)]));
        let targets = targets(&["R1"]);

        let outcomes = run_with_retry(probe.clone(), &targets, quick_policy(3), limiter()).await;

        assert!(outcomes[0].is_ok());
        // 1 first pass + 2 retries; the third allowed retry never runs.
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }
}
