//! Static tables of named endpoints per protocol family.
//!
//! Pure data: loaded once at startup, read-only afterwards, safely shared
//! across probe workers without locking.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A named group of targets sharing one protocol and probe implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    DnsResolvers,
    WhoisServers,
    DnsRootServers,
    NtpServers,
    Websites,
    CloudStatus,
    ImapServers,
    SmtpServers,
    CertificateAuthorities,
    CdnEndpoints,
    IxpEndpoints,
}

impl Family {
    /// Canonical run order
    pub const ALL: [Family; 11] = [
        Family::DnsResolvers,
        Family::WhoisServers,
        Family::DnsRootServers,
        Family::NtpServers,
        Family::Websites,
        Family::CloudStatus,
        Family::ImapServers,
        Family::SmtpServers,
        Family::CertificateAuthorities,
        Family::CdnEndpoints,
        Family::IxpEndpoints,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Family::DnsResolvers => "dns_resolvers",
            Family::WhoisServers => "whois_servers",
            Family::DnsRootServers => "dns_root_servers",
            Family::NtpServers => "ntp_servers",
            Family::Websites => "websites",
            Family::CloudStatus => "cloud_status",
            Family::ImapServers => "imap_servers",
            Family::SmtpServers => "smtp_servers",
            Family::CertificateAuthorities => "certificate_authorities",
            Family::CdnEndpoints => "cdn_endpoints",
            Family::IxpEndpoints => "ixp_endpoints",
        }
    }

    pub fn from_name(name: &str) -> Option<Family> {
        Family::ALL.into_iter().find(|family| family.name() == name)
    }

    pub fn describe(self) -> &'static str {
        match self {
            Family::DnsResolvers => "public recursive DNS resolvers",
            Family::WhoisServers => "regional and TLD WHOIS registries",
            Family::DnsRootServers => "DNS root servers A through M",
            Family::NtpServers => "well-known NTP time sources",
            Family::Websites => "major technology and government websites",
            Family::CloudStatus => "cloud provider status pages",
            Family::ImapServers => "common IMAP mail servers",
            Family::SmtpServers => "common SMTP submission servers",
            Family::CertificateAuthorities => "certificate authority OCSP/CRL endpoints",
            Family::CdnEndpoints => "content delivery network edges",
            Family::IxpEndpoints => "internet exchange point websites",
        }
    }

    /// Per-attempt network timeout for this family
    pub fn timeout(self) -> Duration {
        match self {
            Family::DnsResolvers | Family::DnsRootServers | Family::NtpServers => {
                Duration::from_secs(5)
            }
            Family::ImapServers
            | Family::SmtpServers
            | Family::WhoisServers
            | Family::CertificateAuthorities => Duration::from_secs(10),
            Family::Websites | Family::IxpEndpoints => Duration::from_secs(15),
            Family::CdnEndpoints => Duration::from_secs(20),
            Family::CloudStatus => Duration::from_secs(30),
        }
    }

    /// How many extra attempts failed targets get. Mail connects are quick
    /// and cheap to re-run on the next invocation, so they get none.
    pub fn retries(self) -> u32 {
        match self {
            Family::ImapServers | Family::SmtpServers => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// HTTP request method for probe attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
}

/// Per-target tuning for HTTP-based probes
#[derive(Debug, Clone)]
pub struct HttpParams {
    pub method: HttpMethod,
    pub timeout: Duration,
    pub verify_tls: bool,
    /// Try `/robots.txt` first, falling back to the root URL on 404
    pub robots_fallback: bool,
    /// Accept 204 No Content as a healthy answer
    pub accept_no_content: bool,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            method: HttpMethod::Get,
            timeout: Duration::from_secs(10),
            verify_tls: true,
            robots_fallback: false,
            accept_no_content: false,
        }
    }
}

/// How a status page body maps onto a health classification.
///
/// Matching hardcoded marker substrings is inherently fragile to upstream
/// page redesigns; the rules live here as per-target data so a redesign
/// costs a table edit, not a probe rewrite.
#[derive(Debug, Clone)]
pub enum HealthRule {
    /// Healthy iff the body contains the provider's "no issues" marker
    BodyMarker { healthy: String },
    /// Healthy iff >= 99% of status icons carry the "available" class,
    /// degraded when warnings exceed 1% or availability drops below that
    IconRatio { icon_class: String, available_class: String, warning_class: String },
}

/// Family-specific probe parameters carried by a target
#[derive(Debug, Clone, Default)]
pub enum Params {
    #[default]
    None,
    Http(HttpParams),
    StatusPage(HealthRule),
    /// IP address queried through the WHOIS server under test
    Whois { query_ip: String },
}

/// A single named endpoint to probe. Immutable after registry construction.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: String,
    pub family: Family,
    pub address: String,
    pub port: Option<u16>,
    pub params: Params,
}

impl Target {
    fn new(family: Family, name: &str, address: &str) -> Self {
        Self {
            name: name.to_string(),
            family,
            address: address.to_string(),
            port: None,
            params: Params::None,
        }
    }

    fn with_port(family: Family, name: &str, address: &str, port: u16) -> Self {
        Self { port: Some(port), ..Self::new(family, name, address) }
    }

    fn with_params(family: Family, name: &str, address: &str, params: Params) -> Self {
        Self { params, ..Self::new(family, name, address) }
    }

    /// Hard per-attempt deadline: the larger of the family timeout and any
    /// per-target HTTP timeout override.
    pub fn timeout(&self) -> Duration {
        match &self.params {
            Params::Http(http) => self.family.timeout().max(http.timeout),
            _ => self.family.timeout(),
        }
    }
}

/// The full immutable target set for one process
#[derive(Debug, Clone)]
pub struct Registry {
    families: Vec<(Family, Vec<Target>)>,
}

impl Registry {
    /// The builtin tables, in canonical family order
    pub fn builtin() -> Self {
        let families = Family::ALL
            .into_iter()
            .map(|family| (family, builtin_targets(family)))
            .collect();
        Self { families }
    }

    /// A registry over explicit per-family target lists, for hosts that
    /// probe a custom endpoint set.
    pub fn from_parts(families: Vec<(Family, Vec<Target>)>) -> Self {
        Self { families }
    }

    pub fn families(&self) -> impl Iterator<Item = Family> + '_ {
        self.families.iter().map(|(family, _)| *family)
    }

    pub fn targets(&self, family: Family) -> &[Target] {
        self.families
            .iter()
            .find(|(f, _)| *f == family)
            .map(|(_, targets)| targets.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.families.iter().map(|(_, targets)| targets.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn builtin_targets(family: Family) -> Vec<Target> {
    match family {
        Family::DnsResolvers => dns_resolvers(),
        Family::WhoisServers => whois_servers(),
        Family::DnsRootServers => dns_root_servers(),
        Family::NtpServers => ntp_servers(),
        Family::Websites => websites(),
        Family::CloudStatus => cloud_status_pages(),
        Family::ImapServers => imap_servers(),
        Family::SmtpServers => smtp_servers(),
        Family::CertificateAuthorities => certificate_authorities(),
        Family::CdnEndpoints => cdn_endpoints(),
        Family::IxpEndpoints => ixp_endpoints(),
    }
}

fn dns_resolvers() -> Vec<Target> {
    const RESOLVERS: [(&str, &str); 10] = [
        ("Google Public DNS - Primary", "8.8.8.8"),
        ("Google Public DNS - Secondary", "8.8.4.4"),
        ("Cloudflare DNS - Primary", "1.1.1.1"),
        ("Cloudflare DNS - Secondary", "1.0.0.1"),
        ("OpenDNS - Primary", "208.67.222.222"),
        ("OpenDNS - Secondary", "208.67.220.220"),
        ("Quad9 - Primary", "9.9.9.9"),
        ("Quad9 - Secondary", "149.112.112.112"),
        ("Comodo Secure DNS - Primary", "8.26.56.26"),
        ("Comodo Secure DNS - Secondary", "8.20.247.20"),
    ];
    RESOLVERS
        .into_iter()
        .map(|(name, ip)| Target::new(Family::DnsResolvers, name, ip))
        .collect()
}

fn dns_root_servers() -> Vec<Target> {
    const ROOTS: [(&str, &str); 13] = [
        ("A", "198.41.0.4"),
        ("B", "199.9.14.201"),
        ("C", "192.33.4.12"),
        ("D", "199.7.91.13"),
        ("E", "192.203.230.10"),
        ("F", "192.5.5.241"),
        ("G", "192.112.36.4"),
        ("H", "198.97.190.53"),
        ("I", "192.36.148.17"),
        ("J", "192.58.128.30"),
        ("K", "193.0.14.129"),
        ("L", "199.7.83.42"),
        ("M", "202.12.27.33"),
    ];
    ROOTS
        .into_iter()
        .map(|(name, ip)| Target::new(Family::DnsRootServers, name, ip))
        .collect()
}

const MAIL_PROVIDERS: [(&str, &str); 9] = [
    ("Gmail", "gmail.com"),
    ("Outlook/O365", "office365.com"),
    ("Yahoo", "mail.yahoo.com"),
    ("iCloud Mail", "mail.me.com"),
    ("AOL Mail", "aol.com"),
    ("Zoho Mail", "zoho.com"),
    ("Mail.com", "mail.com"),
    ("GMX Mail", "gmx.com"),
    ("Fastmail", "fastmail.com"),
];

fn smtp_servers() -> Vec<Target> {
    MAIL_PROVIDERS
        .into_iter()
        .map(|(name, domain)| {
            let host = match name {
                "Outlook/O365" => "smtp.office365.com".to_string(),
                _ => format!("smtp.{domain}"),
            };
            Target::with_port(Family::SmtpServers, name, &host, 587)
        })
        .collect()
}

fn imap_servers() -> Vec<Target> {
    MAIL_PROVIDERS
        .into_iter()
        .map(|(name, domain)| {
            let host = match name {
                "Outlook/O365" => "outlook.office365.com".to_string(),
                _ => format!("imap.{domain}"),
            };
            Target::with_port(Family::ImapServers, name, &host, 993)
        })
        .collect()
}

fn whois_servers() -> Vec<Target> {
    const REGISTRIES: [(&str, &str); 12] = [
        ("whois.apnic.net", "202.12.29.140"),
        ("whois.ripe.net", "193.0.6.135"),
        ("whois.arin.net", "199.212.0.43"),
        ("whois.afrinic.net", "196.216.2.2"),
        ("whois.lacnic.net", "200.3.14.10"),
        ("whois.pir.org", "199.19.56.1"),
        ("whois.educause.edu", "192.52.178.30"),
        ("whois.iana.org", "192.0.32.59"),
        ("riswhois.ripe.net", "193.0.19.33"),
        ("whois.nic.mobi", "194.169.218.57"),
        ("whois.verisign-grs.com", "199.7.59.74"),
        ("whois.nic.google", "216.239.32.10"),
    ];
    REGISTRIES
        .into_iter()
        .map(|(server, ip)| {
            Target::with_params(
                Family::WhoisServers,
                server,
                server,
                Params::Whois { query_ip: ip.to_string() },
            )
        })
        .collect()
}

fn ntp_servers() -> Vec<Target> {
    const SERVERS: [&str; 12] = [
        "time.google.com",
        "time1.google.com",
        "time2.google.com",
        "time3.google.com",
        "time4.google.com",
        "time.nist.gov",
        "time.windows.com",
        "pool.ntp.org",
        "time.apple.com",
        "ntp2.usno.navy.mil",
        "tick.usno.navy.mil",
        "tock.usno.navy.mil",
    ];
    SERVERS
        .into_iter()
        .map(|host| Target::new(Family::NtpServers, host, host))
        .collect()
}

fn cdn_endpoints() -> Vec<Target> {
    const CDNS: [(&str, &str, bool); 6] = [
        ("Cloudflare", "https://www.cloudflare.com/robots.txt", false),
        ("Akamai", "https://developer.akamai.com/", false),
        ("Fastly", "https://www.fastly.com/robots.txt", false),
        ("Amazon CloudFront", "https://d1.awsstatic.com/", false),
        ("Google Cloud CDN", "https://www.google.com/robots.txt", true),
        ("Microsoft Azure CDN", "https://www.microsoft.com/robots.txt", true),
    ];
    CDNS.into_iter()
        .map(|(name, url, accept_no_content)| {
            let params = HttpParams {
                timeout: Duration::from_secs(20),
                accept_no_content,
                ..HttpParams::default()
            };
            Target::with_params(Family::CdnEndpoints, name, url, Params::Http(params))
        })
        .collect()
}

fn cloud_status_pages() -> Vec<Target> {
    vec![
        Target::with_params(
            Family::CloudStatus,
            "AWS",
            "https://health.aws.amazon.com/health/status",
            Params::StatusPage(HealthRule::BodyMarker {
                healthy: "No recent issues".to_string(),
            }),
        ),
        Target::with_params(
            Family::CloudStatus,
            "Google Cloud",
            "https://status.cloud.google.com/",
            Params::StatusPage(HealthRule::IconRatio {
                icon_class: "psd__status-icon".to_string(),
                available_class: "psd__available".to_string(),
                warning_class: "psd__warning".to_string(),
            }),
        ),
        Target::with_params(
            Family::CloudStatus,
            "Azure",
            "https://status.azure.com/",
            Params::StatusPage(HealthRule::BodyMarker {
                healthy: "There are currently no active events".to_string(),
            }),
        ),
    ]
}

fn certificate_authorities() -> Vec<Target> {
    let head = |timeout: u64| HttpParams {
        method: HttpMethod::Head,
        timeout: Duration::from_secs(timeout),
        ..HttpParams::default()
    };
    let get = |timeout: u64, verify_tls: bool| HttpParams {
        method: HttpMethod::Get,
        timeout: Duration::from_secs(timeout),
        verify_tls,
        ..HttpParams::default()
    };
    let table: [(&str, &str, HttpParams); 7] = [
        ("DigiCert OCSP", "http://ocsp.digicert.com", head(10)),
        ("DigiCert CRL", "http://crl3.digicert.com/sha2-ev-server-g1.crl", head(10)),
        ("Let's Encrypt OCSP", "http://e6.o.lencr.org", get(30, false)),
        ("GlobalSign OCSP", "http://ocsp2.globalsign.com/rootr1", head(10)),
        ("Sectigo OCSP", "http://ocsp.sectigo.com", head(10)),
        ("Entrust OCSP", "http://ocsp.entrust.net", get(10, true)),
        ("IdenTrust OCSP", "http://ocsp.identrust.com", head(10)),
    ];
    table
        .into_iter()
        .map(|(name, url, params)| {
            Target::with_params(Family::CertificateAuthorities, name, url, Params::Http(params))
        })
        .collect()
}

fn websites() -> Vec<Target> {
    const SITES: [&str; 22] = [
        "https://www.google.com",
        "https://www.amazon.com",
        "https://www.facebook.com",
        "https://www.apple.com",
        "https://www.microsoft.com",
        "https://www.reddit.com",
        "https://www.wikipedia.org",
        "https://www.netflix.com",
        "https://www.bbc.com",
        "https://www.nytimes.com",
        "https://www.usa.gov",
        "https://www.canada.ca",
        "https://www.gob.mx",
        "https://www.gov.br",
        "https://www.gov.uk",
        "https://www.gouvernement.fr",
        "https://www.bund.de",
        "https://www.belgium.be",
        "https://www.australia.gov.au",
        "https://www.india.gov.in",
        "https://www.japan.go.jp",
        "https://www.gov.sg",
    ];
    SITES
        .into_iter()
        .map(|url| {
            // Reachability only, so expired or mismatched certificates on
            // government sites do not count as outages.
            let params = HttpParams {
                timeout: Duration::from_secs(15),
                verify_tls: false,
                robots_fallback: true,
                ..HttpParams::default()
            };
            Target::with_params(Family::Websites, url, url, Params::Http(params))
        })
        .collect()
}

fn ixp_endpoints() -> Vec<Target> {
    const IXPS: [(&str, &str); 6] = [
        ("DE-CIX (Frankfurt)", "https://www.de-cix.net/"),
        ("LINX (London)", "https://www.linx.net/"),
        ("AMS-IX (Amsterdam)", "https://www.ams-ix.net/"),
        ("NYIIX (New York)", "https://www.nyiix.net/"),
        ("HKIX (Hong Kong)", "https://www.hkix.net/"),
        ("Equinix-IX (Global)", "https://status.equinix.com/"),
    ];
    IXPS.into_iter()
        .map(|(name, url)| {
            let params = HttpParams { timeout: Duration::from_secs(15), ..HttpParams::default() };
            Target::with_params(Family::IxpEndpoints, name, url, Params::Http(params))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_covers_every_family() {
        let registry = Registry::builtin();
        for family in Family::ALL {
            assert!(
                !registry.targets(family).is_empty(),
                "family {family} has no targets"
            );
        }
    }

    #[test]
    fn builtin_table_sizes() {
        let registry = Registry::builtin();
        let expected = [
            (Family::DnsResolvers, 10),
            (Family::WhoisServers, 12),
            (Family::DnsRootServers, 13),
            (Family::NtpServers, 12),
            (Family::Websites, 22),
            (Family::CloudStatus, 3),
            (Family::ImapServers, 9),
            (Family::SmtpServers, 9),
            (Family::CertificateAuthorities, 7),
            (Family::CdnEndpoints, 6),
            (Family::IxpEndpoints, 6),
        ];
        for (family, count) in expected {
            assert_eq!(registry.targets(family).len(), count, "{family}");
        }
    }

    #[test]
    fn target_names_are_unique_within_a_family() {
        let registry = Registry::builtin();
        for family in Family::ALL {
            let mut names: Vec<_> =
                registry.targets(family).iter().map(|t| t.name.as_str()).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(before, names.len(), "duplicate target name in {family}");
        }
    }

    #[test]
    fn every_target_carries_its_family() {
        let registry = Registry::builtin();
        for family in Family::ALL {
            assert!(registry.targets(family).iter().all(|t| t.family == family));
        }
    }

    #[test]
    fn mail_families_have_ports_and_no_retries() {
        let registry = Registry::builtin();
        for family in [Family::SmtpServers, Family::ImapServers] {
            assert_eq!(family.retries(), 0);
            assert!(registry.targets(family).iter().all(|t| t.port.is_some()));
        }
        assert_eq!(Family::DnsResolvers.retries(), 1);
    }

    #[test]
    fn family_names_round_trip() {
        for family in Family::ALL {
            assert_eq!(Family::from_name(family.name()), Some(family));
        }
        assert_eq!(Family::from_name("bgp_collectors"), None);
    }

    #[test]
    fn whois_targets_carry_a_query_ip() {
        let registry = Registry::builtin();
        for target in registry.targets(Family::WhoisServers) {
            assert!(matches!(target.params, Params::Whois { .. }), "{}", target.name);
        }
    }

    #[test]
    fn per_target_timeout_overrides_family_timeout() {
        let registry = Registry::builtin();
        let lets_encrypt = registry
            .targets(Family::CertificateAuthorities)
            .iter()
            .find(|t| t.name.contains("Let's Encrypt"))
            .expect("Let's Encrypt endpoint present");
        assert_eq!(lets_encrypt.timeout(), Duration::from_secs(30));

        let digicert = registry
            .targets(Family::CertificateAuthorities)
            .iter()
            .find(|t| t.name == "DigiCert OCSP")
            .expect("DigiCert endpoint present");
        assert_eq!(digicert.timeout(), Duration::from_secs(10));
    }
}
