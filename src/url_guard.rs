//! URL safety and scope policy.
//!
//! Every candidate URL passes through [`UrlGuard::validate`] before it is
//! fetched, including redirect targets. The guard rejects non-http(s)
//! schemes and anything that resolves into loopback, link-local or private
//! address space, so a crawl seeded on a public site can never be steered
//! at internal infrastructure.

use std::net::IpAddr;

use log::debug;
use url::{Host, Url};

use crate::error::{CrawlError, CrawlResult};

/// Validates candidate URLs against the crawl safety policy.
///
/// Side-effect-free apart from the optional DNS lookup.
#[derive(Debug, Clone)]
pub struct UrlGuard {
    blocked_hosts: Vec<String>,
    dns_check: bool,
}

impl Default for UrlGuard {
    fn default() -> Self {
        Self {
            blocked_hosts: Vec::new(),
            dns_check: true,
        }
    }
}

impl UrlGuard {
    #[must_use]
    pub fn new(blocked_hosts: Vec<String>, dns_check: bool) -> Self {
        Self {
            blocked_hosts,
            dns_check,
        }
    }

    /// Validate and parse a candidate URL.
    ///
    /// Returns the parsed URL on success so callers do not parse twice.
    pub async fn validate(&self, raw: &str) -> CrawlResult<Url> {
        let url = Url::parse(raw).map_err(|e| CrawlError::UnsafeUrl {
            url: raw.to_string(),
            reason: format!("unparseable: {e}"),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(self.reject(raw, format!("scheme '{}' not allowed", url.scheme())));
        }

        let host = url
            .host()
            .ok_or_else(|| self.reject(raw, "missing host".to_string()))?;

        match host {
            Host::Ipv4(addr) => self.check_ip(raw, IpAddr::V4(addr))?,
            Host::Ipv6(addr) => self.check_ip(raw, IpAddr::V6(addr))?,
            Host::Domain(domain) => {
                let lowered = domain.to_ascii_lowercase();
                if lowered == "localhost" || lowered.ends_with(".localhost") {
                    return Err(self.reject(raw, "loopback host".to_string()));
                }
                if self
                    .blocked_hosts
                    .iter()
                    .any(|blocked| blocked.eq_ignore_ascii_case(&lowered))
                {
                    return Err(self.reject(raw, format!("host '{lowered}' is deny-listed")));
                }
                if self.dns_check {
                    self.check_resolved(raw, &lowered, url.port_or_known_default().unwrap_or(443))
                        .await?;
                }
            }
        }

        Ok(url)
    }

    async fn check_resolved(&self, raw: &str, domain: &str, port: u16) -> CrawlResult<()> {
        let addrs = tokio::net::lookup_host((domain, port))
            .await
            .map_err(|e| self.reject(raw, format!("DNS resolution failed: {e}")))?;
        for addr in addrs {
            self.check_ip(raw, addr.ip())?;
        }
        debug!("URL guard passed for {raw}");
        Ok(())
    }

    fn check_ip(&self, raw: &str, ip: IpAddr) -> CrawlResult<()> {
        if let Some(reason) = forbidden_ip_class(ip) {
            return Err(self.reject(raw, format!("{reason} address {ip}")));
        }
        Ok(())
    }

    fn reject(&self, url: &str, reason: String) -> CrawlError {
        CrawlError::UnsafeUrl {
            url: url.to_string(),
            reason,
        }
    }
}

/// Classify an address as unsafe-to-crawl, returning the policy label.
fn forbidden_ip_class(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => {
            if v4.is_loopback() {
                Some("loopback")
            } else if v4.is_private() {
                Some("private-range")
            } else if v4.is_link_local() {
                Some("link-local")
            } else if v4.is_unspecified() {
                Some("unspecified")
            } else {
                None
            }
        }
        IpAddr::V6(v6) => {
            // IPv4-mapped addresses follow the IPv4 policy, or
            // `[::ffff:10.0.0.1]` would slip past the private-range checks.
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return forbidden_ip_class(IpAddr::V4(mapped));
            }
            let segments = v6.segments();
            if v6.is_loopback() {
                Some("loopback")
            } else if v6.is_unspecified() {
                Some("unspecified")
            } else if (segments[0] & 0xfe00) == 0xfc00 {
                // fc00::/7 unique local
                Some("private-range")
            } else if (segments[0] & 0xffc0) == 0xfe80 {
                // fe80::/10
                Some("link-local")
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> UrlGuard {
        UrlGuard::new(Vec::new(), false)
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        for bad in ["ftp://example.com/file", "file:///etc/passwd", "javascript:alert(1)"] {
            let err = guard().validate(bad).await.unwrap_err();
            assert!(matches!(err, CrawlError::UnsafeUrl { .. }), "{bad}");
        }
    }

    #[tokio::test]
    async fn rejects_loopback_and_private_hosts() {
        for bad in [
            "http://localhost/admin",
            "http://sub.localhost/",
            "http://127.0.0.1/",
            "http://10.1.2.3/",
            "http://172.16.0.1/",
            "http://192.168.1.1/",
            "http://169.254.0.5/",
            "http://[::1]/",
            "http://[fd00::1]/",
            "http://[fe80::1]/",
        ] {
            let err = guard().validate(bad).await.unwrap_err();
            assert!(matches!(err, CrawlError::UnsafeUrl { .. }), "{bad}");
        }
    }

    #[tokio::test]
    async fn rejects_ipv4_mapped_private_literals() {
        for bad in [
            "http://[::ffff:10.0.0.1]/",
            "http://[::ffff:127.0.0.1]/",
            "http://[::ffff:192.168.1.1]/",
            "http://[::ffff:169.254.0.5]/",
        ] {
            let err = guard().validate(bad).await.unwrap_err();
            assert!(matches!(err, CrawlError::UnsafeUrl { .. }), "{bad}");
        }
    }

    #[tokio::test]
    async fn accepts_ipv4_mapped_public_literals() {
        assert!(guard().validate("http://[::ffff:93.184.216.34]/").await.is_ok());
    }

    #[tokio::test]
    async fn accepts_public_hosts_without_dns() {
        let url = guard()
            .validate("https://example.com/manual/100/")
            .await
            .unwrap();
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[tokio::test]
    async fn accepts_public_literal_addresses() {
        assert!(guard().validate("http://93.184.216.34/").await.is_ok());
    }

    #[tokio::test]
    async fn deny_list_is_case_insensitive() {
        let guard = UrlGuard::new(vec!["Blocked.Example.com".to_string()], false);
        let err = guard
            .validate("https://blocked.example.com/page")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("deny-listed"));
    }
}
