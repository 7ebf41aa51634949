//! HTTP/1.1 client: one request/response exchange per fetch
//!
//! Each fetch opens a fresh connection, writes a single GET request, parses
//! the response and decodes the body. The whole exchange races the
//! configured timeout; when the deadline wins, the in-flight future is
//! dropped together with the connection it owns.

use crate::config::{Config, TextEncoding};
use crate::connection::Connector;
use crate::decode::decode_body;
use crate::error::{FetchError, Phase, Result};
use crate::headers::Headers;
use crate::line::LineReader;
use crate::response::{self, BodyFraming, Response};
use crate::target::Target;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Default Accept header
pub const DEFAULT_ACCEPT: &str = "text/html, application/json; charset=utf-8";

/// Accept-Encoding header; every listed coding is decodable
pub const ACCEPT_ENCODING: &str = "gzip, br, deflate, identity";

/// Default Accept-Language header
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US";

/// HTTP/1.1 client
#[derive(Debug, Clone)]
pub struct Client {
    connector: Connector,
    headers: Headers,
    timeout: Duration,
    max_redirects: u32,
    encoding: TextEncoding,
    log_headers: bool,
}

impl Client {
    /// Create a client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self::with_connector(config, Connector::new()?))
    }

    /// Create a client using a specific connector
    pub fn with_connector(config: &Config, connector: Connector) -> Self {
        Self {
            connector,
            headers: default_headers(&config.user_agent),
            timeout: config.request_timeout(),
            max_redirects: config.max_redirects,
            encoding: config.encoding,
            log_headers: config.log_headers,
        }
    }

    /// Add or override a request header
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the redirect budget
    pub fn with_max_redirects(mut self, max_redirects: u32) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Enable or disable header logging
    pub fn log_headers(mut self, enable: bool) -> Self {
        self.log_headers = enable;
        self
    }

    /// Request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Redirect budget
    pub fn max_redirects(&self) -> u32 {
        self.max_redirects
    }

    /// Headers sent after `Host`, in order
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Serialize the GET request for `target`
    pub fn request_bytes(&self, target: &Target) -> Vec<u8> {
        let mut request = String::with_capacity(512);
        request.push_str("GET ");
        request.push_str(&target.request_target());
        request.push_str(" HTTP/1.1\r\n");

        request.push_str("Host: ");
        request.push_str(&target.host_header());
        request.push_str("\r\n");

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("host") {
                continue;
            }
            request.push_str(name);
            request.push_str(": ");
            request.push_str(value);
            request.push_str("\r\n");
        }
        request.push_str("\r\n");

        self.encoding.encode(&request)
    }

    /// Fetch `target` once, without following redirects
    ///
    /// Fails with `Timeout` if the exchange does not finish within the
    /// configured timeout. The connection never outlives this call.
    pub async fn fetch(&self, target: &Target) -> Result<Response> {
        match tokio::time::timeout(self.timeout, self.exchange(target)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %target, timeout_ms = self.timeout.as_millis() as u64, "Request timed out");
                Err(FetchError::Timeout {
                    host: target.host().to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }

    async fn exchange(&self, target: &Target) -> Result<Response> {
        info!("Connecting to {}...", target);
        // Owned by this future; dropped on every early return and on timeout
        let mut conn = self.connector.connect(target).await?;

        let request = self.request_bytes(target);
        conn.write_all(&request)
            .await
            .map_err(|source| FetchError::Io {
                phase: Phase::WriteRequest,
                source,
            })?;
        conn.flush().await.map_err(|source| FetchError::Io {
            phase: Phase::WriteRequest,
            source,
        })?;

        let mut reader = LineReader::new(conn, self.encoding);
        let status = response::read_status(&mut reader).await?;
        let headers = response::read_headers(&mut reader, self.log_headers).await?;
        let framing = BodyFraming::from_headers(&status, &headers)?;
        let raw = response::read_body(&mut reader, framing).await?;

        reader.into_inner().close().await;

        let body = decode_body(raw, headers.get("content-encoding"), self.encoding)?;
        debug!(code = status.code, len = body.len(), "Response complete");

        Ok(Response {
            url: target.url().clone(),
            status,
            headers,
            body,
        })
    }
}

/// Default request headers, in wire order
fn default_headers(user_agent: &str) -> Headers {
    [
        ("Connection", "keep-alive"),
        ("User-Agent", user_agent),
        ("Accept", DEFAULT_ACCEPT),
        ("Accept-Encoding", ACCEPT_ENCODING),
        ("Accept-Language", DEFAULT_ACCEPT_LANGUAGE),
        ("Cache-Control", "no-cache; max-age=0"),
        ("Content-Length", "0"),
    ]
    .into_iter()
    .collect()
}
