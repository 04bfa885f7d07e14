// SPDX-FileCopyrightText: 2026 Rosalind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SSRF prevention for outbound agent and provider calls.
//!
//! Two layers:
//! 1. [`SsrfPolicy::validate`]: a pure, synchronous check of the URL itself,
//!    run before any DNS lookup or connection attempt.
//! 2. [`SsrfSafeResolver`]: a `reqwest::dns::Resolve` implementation that
//!    filters resolved addresses, catching hostnames that point inward.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use thiserror::Error;
use tracing::{error, info, warn};
use url::{Host, Url};

use crate::tls::is_localhost;

/// Why a URL was refused.
///
/// `Invalid` is caller error; `Blocked` is security policy. Callers surface
/// them differently, so the two are never conflated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlValidationError {
    #[error("Invalid URL: {0}")]
    Invalid(String),
    #[error("SSRF blocked: {0}")]
    Blocked(String),
}

/// Outbound target policy: which private addresses and hostnames are trusted.
#[derive(Debug, Clone, Default)]
pub struct SsrfPolicy {
    allowed_private_ips: Vec<IpAddr>,
    trusted_hosts: Vec<String>,
}

impl SsrfPolicy {
    /// Build a policy from configuration strings. Unparseable IPs are ignored.
    pub fn new(allowed_private_ips: &[String], trusted_hosts: &[String]) -> Self {
        Self {
            allowed_private_ips: allowed_private_ips
                .iter()
                .filter_map(|s| s.trim().parse::<IpAddr>().ok())
                .collect(),
            trusted_hosts: trusted_hosts
                .iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    /// Add a trusted hostname (exempt from resolver filtering).
    pub fn trust_host(&mut self, host: &str) {
        let host = host.to_ascii_lowercase();
        if !self.trusted_hosts.contains(&host) {
            self.trusted_hosts.push(host);
        }
    }

    pub fn allowed_private_ips(&self) -> &[IpAddr] {
        &self.allowed_private_ips
    }

    pub fn is_trusted_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.trusted_hosts.iter().any(|h| *h == host)
    }

    fn ip_allowed(&self, ip: &IpAddr) -> bool {
        !SsrfSafeResolver::is_private(ip) || self.allowed_private_ips.contains(ip)
    }

    /// Validate a caller-supplied base URL without touching the network.
    ///
    /// Rejects non-HTTP schemes, `localhost`, `*.local`, and literal
    /// loopback/private/link-local addresses not on the allowlist.
    pub fn validate(&self, raw: &str) -> Result<Url, UrlValidationError> {
        let parsed =
            Url::parse(raw.trim()).map_err(|e| UrlValidationError::Invalid(e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(UrlValidationError::Blocked(format!(
                    "scheme `{other}` is not allowed"
                )));
            }
        }

        let blocked = match parsed.host() {
            None => return Err(UrlValidationError::Invalid("missing host".to_string())),
            Some(Host::Domain(domain)) => {
                let domain = domain.trim_end_matches('.').to_ascii_lowercase();
                if is_localhost(&domain) || domain.ends_with(".localhost") {
                    Some(format!("host `{domain}` is loopback"))
                } else if domain == "local" || domain.ends_with(".local") {
                    Some(format!("host `{domain}` is a link-local mDNS name"))
                } else {
                    None
                }
            }
            Some(Host::Ipv4(v4)) => {
                let ip = IpAddr::V4(v4);
                (!self.ip_allowed(&ip)).then(|| format!("URL targets private IP {ip}"))
            }
            Some(Host::Ipv6(v6)) => {
                let ip = IpAddr::V6(v6);
                (!self.ip_allowed(&ip)).then(|| format!("URL targets private IP {ip}"))
            }
        };

        match blocked {
            Some(reason) => {
                warn!(reason = %reason, "outbound URL rejected");
                Err(UrlValidationError::Blocked(reason))
            }
            None => Ok(parsed),
        }
    }
}

/// Custom DNS resolver that blocks private/reserved IP addresses.
///
/// When a hostname resolves to a private IP the address is dropped unless it
/// is allowlisted, or the hostname itself is trusted (internal agent
/// services on a compose network resolve to private ranges).
pub struct SsrfSafeResolver {
    policy: SsrfPolicy,
}

impl SsrfSafeResolver {
    pub fn new(policy: SsrfPolicy) -> Self {
        Self { policy }
    }

    /// Check if an IP is in a private or reserved range.
    ///
    /// Blocks: RFC 1918, loopback, link-local, broadcast, unspecified,
    /// cloud metadata endpoint, IPv6 loopback, unique-local, link-local,
    /// and IPv4-mapped IPv6 forms of all of these.
    pub fn is_private(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                v4.is_private()
                    || v4.is_loopback()
                    || v4.is_link_local()
                    || v4.is_broadcast()
                    || v4.is_unspecified()
                    || *v4 == Ipv4Addr::new(169, 254, 169, 254) // cloud metadata
            }
            IpAddr::V6(v6) => {
                if let Some(mapped) = v6.to_ipv4_mapped() {
                    return Self::is_private(&IpAddr::V4(mapped));
                }
                v6.is_loopback()
                    || v6.is_unspecified()
                    || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7 unique local
                    || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10 link-local
            }
        }
    }
}

impl Resolve for SsrfSafeResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let policy = self.policy.clone();
        let hostname = name.as_str().to_string();

        Box::pin(async move {
            let host = format!("{hostname}:0");
            let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&host)
                .await
                .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> { Box::new(e) })?
                .collect();

            if policy.is_trusted_host(&hostname) {
                let addrs: Addrs = Box::new(addrs.into_iter());
                return Ok(addrs);
            }

            let filtered: Vec<SocketAddr> = addrs
                .into_iter()
                .filter(|addr| {
                    let ip = addr.ip();
                    if !SsrfSafeResolver::is_private(&ip) {
                        true
                    } else if policy.allowed_private_ips.contains(&ip) {
                        info!(ip = %ip, host = %hostname, "allowing configured private IP");
                        true
                    } else {
                        error!(ip = %ip, host = %hostname, "SSRF blocked: resolved to private IP");
                        false
                    }
                })
                .collect();

            if filtered.is_empty() {
                let err: Box<dyn std::error::Error + Send + Sync> =
                    format!("SSRF blocked: {hostname} resolves only to private IPs").into();
                return Err(err);
            }

            let addrs: Addrs = Box::new(filtered.into_iter());
            Ok(addrs)
        })
    }
}

/// Convenience function to check if an IP is private/reserved.
pub fn is_private_ip(ip: &IpAddr) -> bool {
    SsrfSafeResolver::is_private(ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn strict() -> SsrfPolicy {
        SsrfPolicy::default()
    }

    #[test]
    fn blocks_rfc1918_ranges() {
        for ip in [
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(172, 16, 0, 1),
            Ipv4Addr::new(172, 31, 255, 255),
            Ipv4Addr::new(192, 168, 1, 1),
        ] {
            assert!(SsrfSafeResolver::is_private(&IpAddr::V4(ip)), "{ip}");
        }
    }

    #[test]
    fn blocks_loopback_link_local_and_metadata() {
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(127, 255, 255, 255))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(169, 254, 1, 1))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::new(169, 254, 169, 254))));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::UNSPECIFIED)));
        assert!(is_private_ip(&IpAddr::V4(Ipv4Addr::BROADCAST)));
    }

    #[test]
    fn blocks_ipv6_reserved_and_mapped() {
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::UNSPECIFIED)));
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 1))));
        assert!(is_private_ip(&IpAddr::V6(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1))));
        let mapped = Ipv4Addr::new(10, 0, 0, 1).to_ipv6_mapped();
        assert!(is_private_ip(&IpAddr::V6(mapped)));
    }

    #[test]
    fn allows_public_addresses() {
        assert!(!is_private_ip(&IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))));
        assert!(!is_private_ip(&IpAddr::V4(Ipv4Addr::new(104, 18, 0, 1))));
        let v6 = Ipv6Addr::new(0x2001, 0x4860, 0x4860, 0, 0, 0, 0, 0x8888);
        assert!(!is_private_ip(&IpAddr::V6(v6)));
    }

    #[test]
    fn validate_rejects_internal_targets() {
        let policy = strict();
        for url in [
            "http://localhost:8080",
            "http://127.0.0.1",
            "http://10.0.0.1",
            "http://192.168.1.1",
            "http://x.local",
            "http://[::1]:9000/",
            "http://169.254.169.254/latest/meta-data",
        ] {
            let err = policy.validate(url).unwrap_err();
            assert!(matches!(err, UrlValidationError::Blocked(_)), "{url}: {err}");
        }
    }

    #[test]
    fn validate_rejects_non_http_schemes() {
        let err = strict().validate("file:///etc/passwd").unwrap_err();
        assert!(matches!(err, UrlValidationError::Blocked(_)));
        let err = strict().validate("gopher://example.com/").unwrap_err();
        assert!(matches!(err, UrlValidationError::Blocked(_)));
    }

    #[test]
    fn malformed_url_is_distinct_from_policy_rejection() {
        let err = strict().validate("not a url").unwrap_err();
        assert!(matches!(err, UrlValidationError::Invalid(_)));
        assert!(err.to_string().starts_with("Invalid URL"));
    }

    #[test]
    fn validate_accepts_public_urls_and_hostnames() {
        let policy = strict();
        assert!(policy.validate("https://api.example.org/v1").is_ok());
        assert!(policy.validate("http://8.8.8.8/dns").is_ok());
        assert!(policy.validate("http://agent-stage2-lit:8010").is_ok());
    }

    #[test]
    fn allowlisted_private_ip_passes_static_check() {
        let policy = SsrfPolicy::new(&["127.0.0.1".to_string(), "bogus".to_string()], &[]);
        assert_eq!(policy.allowed_private_ips().len(), 1);
        assert!(policy.validate("http://127.0.0.1:4545/run").is_ok());
        assert!(policy.validate("http://127.0.0.2:4545/run").is_err());
    }

    #[test]
    fn trusted_hosts_match_case_insensitively() {
        let mut policy = SsrfPolicy::new(&[], &["Agent-Stage3".to_string()]);
        policy.trust_host("agent-stage4");
        assert!(policy.is_trusted_host("agent-stage3"));
        assert!(policy.is_trusted_host("AGENT-STAGE4"));
        assert!(!policy.is_trusted_host("agent-stage5"));
    }
}
