use std::io;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;

use super::{Probe, Reading};
use crate::registry::{Params, Target};

/// Runs the system `whois` client against a registry server, asking it
/// about its own documented address: `whois -h <server> <ip>`.
///
/// The binary name is configurable so a missing client can be diagnosed
/// (and tested) without touching the PATH.
pub struct WhoisProbe {
    binary: String,
    timeout: Duration,
}

impl WhoisProbe {
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into(), timeout: Duration::from_secs(10) }
    }
}

#[async_trait]
impl Probe for WhoisProbe {
    async fn check(&self, target: &Target) -> Result<Reading> {
        let query_ip = match &target.params {
            Params::Whois { query_ip } => query_ip.as_str(),
            _ => target.address.as_str(),
        };

        let mut command = Command::new(&self.binary);
        command
            .arg("-h")
            .arg(&target.address)
            .arg(query_ip)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Err(_) => {
                return Ok(Reading::unreachable(format!(
                    "whois query timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            Ok(Err(error)) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Reading::unreachable(format!(
                    "whois binary {:?} not found",
                    self.binary
                )));
            }
            Ok(Err(error)) => {
                return Err(error).with_context(|| format!("failed to run {:?}", self.binary));
            }
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            Ok(Reading::ok())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Ok(Reading::unreachable(format!(
                "whois exited with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Family;
    use crate::types::Classification;

    fn whois_target() -> Target {
        Target {
            name: "whois.iana.org".to_string(),
            family: Family::WhoisServers,
            address: "whois.iana.org".to_string(),
            port: None,
            params: Params::Whois { query_ip: "192.0.32.59".to_string() },
        }
    }

    #[tokio::test]
    async fn missing_binary_reports_not_found_without_erroring() {
        let probe = WhoisProbe::new("netpulse-no-such-whois-client");
        let reading = probe.check(&whois_target()).await.expect("handled inside the probe");
        assert_eq!(reading.classification, Classification::Unreachable);
        assert!(reading.note.expect("note").contains("not found"));
    }

    #[tokio::test]
    async fn nonzero_exit_reports_the_exit_status() {
        // `false` exists everywhere and ignores its arguments.
        let probe = WhoisProbe::new("false");
        let reading = probe.check(&whois_target()).await.expect("handled inside the probe");
        assert_eq!(reading.classification, Classification::Unreachable);
        assert!(reading.note.expect("note").contains("exited with"));
    }
}
