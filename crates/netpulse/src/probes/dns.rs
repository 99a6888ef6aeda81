use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RecordType;

use super::{Probe, Reading};
use crate::registry::{Family, Target};

/// Queries a target nameserver directly, so what gets measured is the
/// reachability of that server rather than of the local resolver path.
///
/// Resolver targets answer an `A` query for a reference domain; root
/// servers answer an `NS` query for the root zone, which they are
/// authoritative for.
pub struct DnsProbe {
    reference_domain: String,
    timeout: Duration,
}

impl DnsProbe {
    pub fn new(reference_domain: impl Into<String>) -> Self {
        Self { reference_domain: reference_domain.into(), timeout: Duration::from_secs(5) }
    }

    fn resolver_for(&self, nameserver: IpAddr) -> TokioAsyncResolver {
        let servers = NameServerConfigGroup::from_ips_clear(&[nameserver], 53, true);
        let config = ResolverConfig::from_parts(None, vec![], servers);
        let mut opts = ResolverOpts::default();
        opts.timeout = self.timeout;
        // Retrying is the orchestrator's job, not the resolver's.
        opts.attempts = 1;
        opts.cache_size = 0;
        TokioAsyncResolver::tokio(config, opts)
    }
}

#[async_trait]
impl Probe for DnsProbe {
    async fn check(&self, target: &Target) -> Result<Reading> {
        let nameserver: IpAddr = target
            .address
            .parse()
            .with_context(|| format!("invalid nameserver address {:?}", target.address))?;
        let resolver = self.resolver_for(nameserver);

        match target.family {
            Family::DnsRootServers => {
                let answer = resolver
                    .lookup(".", RecordType::NS)
                    .await
                    .context("NS query for the root zone failed")?;
                if answer.iter().next().is_none() {
                    return Err(anyhow!("empty NS answer for the root zone"));
                }
            }
            _ => {
                let answer = resolver
                    .lookup_ip(self.reference_domain.as_str())
                    .await
                    .with_context(|| format!("A query for {} failed", self.reference_domain))?;
                if answer.iter().next().is_none() {
                    return Err(anyhow!("empty A answer for {}", self.reference_domain));
                }
            }
        }

        Ok(Reading::ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Params;
    use crate::types::Classification;

    fn resolver_target(address: &str) -> Target {
        Target {
            name: "test resolver".to_string(),
            family: Family::DnsResolvers,
            address: address.to_string(),
            port: None,
            params: Params::None,
        }
    }

    #[tokio::test]
    async fn malformed_nameserver_address_is_unreachable_not_a_panic() {
        let probe = DnsProbe::new("example.com");
        let target = resolver_target("not-an-ip");
        let outcome = super::super::observe(&probe, &target).await;
        assert_eq!(outcome.classification, Classification::Unreachable);
        assert!(outcome.detail.expect("detail set").contains("invalid nameserver address"));
    }

    // Requires network access.
    #[tokio::test]
    #[ignore]
    async fn queries_a_public_resolver() {
        let probe = DnsProbe::new("example.com");
        let reading = probe.check(&resolver_target("8.8.8.8")).await.expect("query succeeds");
        assert_eq!(reading.classification, Classification::Ok);
    }
}
