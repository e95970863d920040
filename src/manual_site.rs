//! Access policy for versioned manual sites gated by a daily access cookie.
//!
//! These sites serve their content only to clients presenting a `guid`
//! cookie derived from the current date, scoped to the manual version named
//! by the last path segment of the base URL.

use chrono::Local;
use log::warn;
use url::Url;

use crate::config::{ConnectorConfig, ConnectorConfigBuilder, CookieSpec, Seeded};
use crate::error::{CrawlError, CrawlResult};

/// Source tag recorded on documents produced from a manual site.
pub const MANUAL_SOURCE_TAG: &str = "label_manual";

/// Version assumed when the base URL does not name one.
const DEFAULT_MANUAL_VERSION: u32 = 100;

/// Manual version from the last path segment of the base URL.
///
/// A base URL without a numeric trailing segment falls back to the default
/// version, with a warning, rather than failing the whole crawl.
#[must_use]
pub fn extract_version(base_url: &str) -> u32 {
    let version = Url::parse(base_url).ok().and_then(|url| {
        url.path_segments()?
            .filter(|segment| !segment.is_empty())
            .next_back()?
            .parse::<u32>()
            .ok()
    });
    match version {
        Some(version) => version,
        None => {
            warn!(
                "no manual version in {base_url}, assuming {DEFAULT_MANUAL_VERSION}"
            );
            DEFAULT_MANUAL_VERSION
        }
    }
}

/// The access cookie the manual site expects: an MD5 of today's date,
/// scoped to the version path.
pub fn access_cookie(base_url: &str) -> CrawlResult<CookieSpec> {
    let url = Url::parse(base_url)
        .map_err(|e| CrawlError::Config(format!("invalid manual base URL {base_url}: {e}")))?;
    let domain = url
        .host_str()
        .ok_or_else(|| {
            CrawlError::Config(format!("manual base URL {base_url} has no host"))
        })?
        .to_string();
    let version = extract_version(base_url);

    Ok(CookieSpec {
        name: "guid".to_string(),
        value: daily_guid(),
        domain: Some(domain),
        path: Some(format!("/{version}")),
    })
}

/// Connector configuration preloaded with the manual-site access policy.
/// The cookie value is computed once, so a crawl spanning midnight keeps the
/// guid it started with.
pub fn manual_config(base_url: &str) -> CrawlResult<ConnectorConfigBuilder<Seeded>> {
    Ok(ConnectorConfig::builder()
        .seed_url(base_url)
        .recursive(true)
        .source(MANUAL_SOURCE_TAG)
        .cookie(access_cookie(base_url)?))
}

fn daily_guid() -> String {
    let date = Local::now().format("%d.%m.%Y").to_string();
    hex::encode(*md5::compute(date.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_the_last_path_segment() {
        assert_eq!(extract_version("https://manual.example.com/205"), 205);
        assert_eq!(extract_version("https://manual.example.com/205/"), 205);
        assert_eq!(extract_version("https://manual.example.com/docs/117"), 117);
    }

    #[test]
    fn missing_version_falls_back_to_default() {
        assert_eq!(extract_version("https://manual.example.com/"), 100);
        assert_eq!(extract_version("https://manual.example.com/latest"), 100);
        assert_eq!(extract_version("not a url"), 100);
    }

    #[test]
    fn cookie_is_scoped_to_host_and_version_path() {
        let cookie = access_cookie("https://manual.example.com/205").unwrap();
        assert_eq!(cookie.name, "guid");
        assert_eq!(cookie.domain.as_deref(), Some("manual.example.com"));
        assert_eq!(cookie.path.as_deref(), Some("/205"));
    }

    #[test]
    fn guid_is_a_32_char_md5_hex_digest() {
        let guid = daily_guid();
        assert_eq!(guid.len(), 32);
        assert!(guid.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hostless_base_url_is_a_config_error() {
        let err = access_cookie("file:///manual/205").unwrap_err();
        assert!(matches!(err, CrawlError::Config(_)));
    }

    #[test]
    fn manual_config_carries_the_source_tag() {
        let config = manual_config("https://manual.example.com/205")
            .unwrap()
            .dns_check(false)
            .build()
            .unwrap();
        assert_eq!(config.source(), MANUAL_SOURCE_TAG);
        assert!(config.recursive());
        assert_eq!(config.cookies().len(), 1);
    }
}
