//! Normalized request targets

use crate::error::{FetchError, Result};
use std::fmt;
use std::str::FromStr;
use url::{Host, Url};

/// Well-known TLS port; connections to it are always upgraded
pub const SECURE_PORT: u16 = 443;

/// An absolute http/https URL with a resolved host and port
///
/// Bare input such as `example.com/path` is rewritten to
/// `https://example.com/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    host: String,
    port: u16,
}

impl Target {
    /// Parse user input, prefixing `https://` when no http(s) scheme is given
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(FetchError::InvalidUrl("empty URL".to_string()));
        }

        let lower = input.to_ascii_lowercase();
        let normalized = if lower.starts_with("http://") || lower.starts_with("https://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };

        let url = Url::parse(&normalized)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", input, e)))?;
        Self::from_url(url)
    }

    /// Validate an already-parsed URL
    pub fn from_url(url: Url) -> Result<Self> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                url
            )));
        }

        let host = match url.host() {
            Some(Host::Domain(domain)) if !domain.is_empty() => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            _ => return Err(FetchError::InvalidUrl(format!("{}: missing host", url))),
        };

        let port = url
            .port_or_known_default()
            .ok_or_else(|| FetchError::InvalidUrl(format!("{}: missing port", url)))?;

        Ok(Self { url, host, port })
    }

    /// The full URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host name or IP address, without IPv6 brackets
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Port, defaulted from the scheme when not explicit
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the connection to this target is TLS-wrapped
    pub fn is_secure(&self) -> bool {
        self.port == SECURE_PORT || self.url.scheme() == "https"
    }

    /// Origin-form request target: path plus optional `?query`
    pub fn request_target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// Value for the `Host` header; carries the port only when it is explicit
    pub fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or(&self.host);
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Scheme, host, port and path, with query and fragment dropped
    pub fn without_query(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.to_string()
    }

    /// Full URL with only the fragment dropped
    pub fn without_fragment(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }

    /// Resolve a `Location` value, absolute or relative to this target
    pub fn join(&self, location: &str) -> Result<Self> {
        let url = self
            .url
            .join(location.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", location, e)))?;
        Self::from_url(url)
    }
}

impl FromStr for Target {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adds_https_scheme() {
        let target = Target::parse("example.com/path?q=1").unwrap();
        assert_eq!(target.url().as_str(), "https://example.com/path?q=1");
        assert_eq!(target.port(), 443);
        assert!(target.is_secure());
    }

    #[test]
    fn test_parse_keeps_http_scheme_case_insensitive() {
        let target = Target::parse("HTTP://Example.com").unwrap();
        assert_eq!(target.url().as_str(), "http://example.com/");
        assert_eq!(target.host(), "example.com");
        assert_eq!(target.port(), 80);
        assert!(!target.is_secure());
    }

    #[test]
    fn test_parse_explicit_port() {
        let target = Target::parse("http://127.0.0.1:8080/a/b").unwrap();
        assert_eq!(target.host(), "127.0.0.1");
        assert_eq!(target.port(), 8080);
        assert_eq!(target.host_header(), "127.0.0.1:8080");
        assert_eq!(target.request_target(), "/a/b");

        let target = Target::parse("http://example.com:443/").unwrap();
        assert!(target.is_secure());
    }

    #[test]
    fn test_parse_ipv6_host() {
        let target = Target::parse("http://[::1]:9000/").unwrap();
        assert_eq!(target.host(), "::1");
        assert_eq!(target.host_header(), "[::1]:9000");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!(matches!(Target::parse(""), Err(FetchError::InvalidUrl(_))));
        assert!(matches!(
            Target::from_url(Url::parse("ftp://example.com").unwrap()),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            Target::parse("http://"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_request_target_with_query() {
        let target = Target::parse("https://example.com/search?q=rust&page=2#top").unwrap();
        assert_eq!(target.request_target(), "/search?q=rust&page=2");
        assert_eq!(target.host_header(), "example.com");
    }

    #[test]
    fn test_without_query_and_fragment() {
        let target = Target::parse("http://h/p?x=2#frag").unwrap();
        assert_eq!(target.without_query(), "http://h/p");
        assert_eq!(target.without_fragment(), "http://h/p?x=2");
    }

    #[test]
    fn test_join_absolute_and_relative() {
        let target = Target::parse("http://example.com/a/b").unwrap();

        let next = target.join("/c").unwrap();
        assert_eq!(next.url().as_str(), "http://example.com/c");

        let next = target.join("d?e=1").unwrap();
        assert_eq!(next.url().as_str(), "http://example.com/a/d?e=1");

        let next = target.join("https://other.org/x").unwrap();
        assert_eq!(next.host(), "other.org");
        assert_eq!(next.port(), 443);

        assert!(target.join("mailto:someone@example.com").is_err());
    }
}
