//! HTTP/1.1 response parsing
//!
//! The parser is strictly sequential: status line, header lines up to the
//! blank line, then a body framed either by chunked transfer coding or by
//! Content-Length. A response that declares neither is rejected instead of
//! being read to EOF.

use crate::error::{FetchError, Phase, Result};
use crate::headers::Headers;
use crate::line::LineReader;
use serde::Serialize;
use std::fmt;
use tokio::io::AsyncRead;
use tracing::{debug, info};
use url::Url;

/// Coarse class of a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatusClass {
    /// 100–199
    Informational,
    /// 200–299
    Success,
    /// 300–399
    Redirect,
    /// 400–499
    ClientError,
    /// 500–599
    ServerError,
    /// Anything outside 100–599
    Custom,
}

impl StatusClass {
    /// Classify a numeric status code
    pub fn from_code(code: u16) -> Self {
        match code {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirect,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Custom,
        }
    }
}

/// Parsed status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Numeric status code
    pub code: u16,
    /// Protocol version after `HTTP/`, e.g. `1.1`
    pub version: String,
    /// Reason phrase, possibly empty
    pub reason: String,
    /// Class derived from `code`
    pub class: StatusClass,
}

impl Status {
    /// Parse `HTTP/<version> <code> <message>`
    ///
    /// The reason phrase may be empty. A missing `HTTP/` prefix, version or
    /// a non-numeric code fails with `InvalidStatusLine`.
    pub fn parse(line: &str) -> Result<Self> {
        let invalid = || FetchError::InvalidStatusLine(line.to_string());

        let rest = line.strip_prefix("HTTP/").ok_or_else(invalid)?;
        let mut parts = rest.splitn(3, ' ');

        let version = parts.next().filter(|v| !v.is_empty()).ok_or_else(invalid)?;
        let code_str = parts.next().ok_or_else(invalid)?;
        if code_str.is_empty() || !code_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let code: u16 = code_str.parse().map_err(|_| invalid())?;
        let reason = parts.next().unwrap_or("").trim();

        Ok(Self {
            code,
            version: version.trim().to_string(),
            reason: reason.to_string(),
            class: StatusClass::from_code(code),
        })
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{} {} {}", self.version, self.code, self.reason)
    }
}

/// How the response body is delimited on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    /// `Transfer-Encoding: chunked`
    Chunked,
    /// `Content-Length: n`
    Length(usize),
    /// Status code that never carries a body (204, 304)
    Empty,
}

impl BodyFraming {
    /// Decide framing from the status and parsed headers
    ///
    /// Only the exact value `chunked` selects chunked framing. Without it a
    /// Content-Length is required, except for 204 and 304 responses.
    pub fn from_headers(status: &Status, headers: &Headers) -> Result<Self> {
        if headers.get("transfer-encoding") == Some("chunked") {
            return Ok(BodyFraming::Chunked);
        }

        if let Some(value) = headers.get("content-length") {
            let len = value
                .trim()
                .parse::<usize>()
                .map_err(|_| FetchError::InvalidContentLength(value.to_string()))?;
            return Ok(BodyFraming::Length(len));
        }

        if matches!(status.code, 204 | 304) {
            return Ok(BodyFraming::Empty);
        }

        Err(FetchError::AmbiguousBodyFraming)
    }
}

/// A fully received and decoded response
#[derive(Debug, Clone)]
pub struct Response {
    /// URL this response was fetched from
    pub url: Url,
    /// Parsed status line
    pub status: Status,
    /// Headers with lower-cased names, in wire order of first occurrence
    pub headers: Headers,
    /// Body after content decoding
    pub body: String,
}

impl Response {
    /// True for 2xx
    pub fn is_success(&self) -> bool {
        self.status.class == StatusClass::Success
    }

    /// True for 3xx
    pub fn is_redirect(&self) -> bool {
        self.status.class == StatusClass::Redirect
    }

    /// `Location` header value
    pub fn location(&self) -> Option<&str> {
        self.headers.get("location")
    }

    /// `Content-Type` header value
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

/// Read and parse the status line
pub async fn read_status<R: AsyncRead + Unpin>(reader: &mut LineReader<R>) -> Result<Status> {
    let line = reader.read_line(Phase::StatusLine).await?;
    let status = Status::parse(&line)?;
    debug!(code = status.code, version = %status.version, "Parsed status line");
    Ok(status)
}

/// Read header lines up to the blank line
///
/// Each line splits on its first `:`; names are trimmed and lower-cased,
/// values trimmed. A repeated name overwrites the earlier value. When
/// `log_headers` is set every header is logged as it is parsed, in wire
/// order.
pub async fn read_headers<R: AsyncRead + Unpin>(
    reader: &mut LineReader<R>,
    log_headers: bool,
) -> Result<Headers> {
    let mut headers = Headers::new();

    loop {
        let line = reader.read_line(Phase::Headers).await?;
        if line.is_empty() {
            return Ok(headers);
        }

        let (key, value) = match line.split_once(':') {
            Some((key, value)) => (key.trim().to_ascii_lowercase(), value.trim()),
            None => (line.trim().to_ascii_lowercase(), ""),
        };

        if log_headers {
            info!(target: "go2web::headers", "{}: {}", key, value);
        }

        headers.insert(key, value);
    }
}

/// Read the raw (still content-encoded) body for the given framing
pub async fn read_body<R: AsyncRead + Unpin>(
    reader: &mut LineReader<R>,
    framing: BodyFraming,
) -> Result<Vec<u8>> {
    match framing {
        BodyFraming::Chunked => read_chunked(reader).await,
        BodyFraming::Length(len) => {
            debug!(len, "Reading body by Content-Length");
            let mut body = Vec::new();
            reader.read_exact(&mut body, len, Phase::Body).await?;
            Ok(body)
        }
        BodyFraming::Empty => Ok(Vec::new()),
    }
}

/// Read a chunked body
///
/// Tolerates the blank line left over from the CRLF that closes each chunk's
/// data, ignores chunk extensions, and stops at the zero-size chunk without
/// consuming trailers.
pub async fn read_chunked<R: AsyncRead + Unpin>(reader: &mut LineReader<R>) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    let mut chunks = 0usize;

    loop {
        let mut line = reader.read_line(Phase::ChunkSize).await?;
        if line.is_empty() {
            line = reader.read_line(Phase::ChunkSize).await?;
        }

        let size = parse_chunk_size(&line)?;
        if size == 0 {
            break;
        }

        reader.read_exact(&mut body, size, Phase::Body).await?;
        chunks += 1;
    }

    debug!(chunks, len = body.len(), "Read chunked body");
    Ok(body)
}

/// Parse a hexadecimal chunk-size line, ignoring any `;extension`
fn parse_chunk_size(line: &str) -> Result<usize> {
    let size = line.split(';').next().unwrap_or("").trim();
    if size.is_empty() {
        return Err(FetchError::InvalidChunkSize(line.to_string()));
    }
    usize::from_str_radix(size, 16).map_err(|_| FetchError::InvalidChunkSize(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TextEncoding;

    fn reader(bytes: &[u8]) -> LineReader<&[u8]> {
        LineReader::new(bytes, TextEncoding::Utf8)
    }

    fn status(code: u16) -> Status {
        Status {
            code,
            version: "1.1".to_string(),
            reason: String::new(),
            class: StatusClass::from_code(code),
        }
    }

    #[test]
    fn test_status_class_boundaries() {
        let cases = [
            (99, StatusClass::Custom),
            (100, StatusClass::Informational),
            (199, StatusClass::Informational),
            (200, StatusClass::Success),
            (299, StatusClass::Success),
            (300, StatusClass::Redirect),
            (399, StatusClass::Redirect),
            (400, StatusClass::ClientError),
            (499, StatusClass::ClientError),
            (500, StatusClass::ServerError),
            (599, StatusClass::ServerError),
            (600, StatusClass::Custom),
            (0, StatusClass::Custom),
        ];
        for (code, class) in cases {
            assert_eq!(StatusClass::from_code(code), class, "code {}", code);
            let parsed = Status::parse(&format!("HTTP/1.1 {} Something", code)).unwrap();
            assert_eq!(parsed.class, class, "status line with code {}", code);
        }
    }

    #[test]
    fn test_parse_status_line() {
        let status = Status::parse("HTTP/1.1 404 Not Found").unwrap();
        assert_eq!(status.code, 404);
        assert_eq!(status.version, "1.1");
        assert_eq!(status.reason, "Not Found");
        assert_eq!(status.class, StatusClass::ClientError);
        assert_eq!(status.to_string(), "HTTP/1.1 404 Not Found");

        let status = Status::parse("HTTP/1.0 200").unwrap();
        assert_eq!(status.code, 200);
        assert_eq!(status.reason, "");
    }

    #[test]
    fn test_parse_status_line_invalid() {
        for line in [
            "",
            "HTTP/1.1",
            "HTTP/1.1 abc OK",
            "HTTP/1.1 -1 OK",
            "HTTP/1.1 99999 Big",
            "ICY 200 OK",
            "HTTP/ 200 OK",
        ] {
            assert!(
                matches!(Status::parse(line), Err(FetchError::InvalidStatusLine(_))),
                "expected failure for {:?}",
                line
            );
        }
    }

    #[tokio::test]
    async fn test_read_headers() {
        let mut r = reader(
            b"Content-Type: text/html\r\nLocation: http://example.com:8080/x\r\nX-Dup: 1\r\nx-dup: 2\r\n\r\nbody",
        );
        let headers = read_headers(&mut r, false).await.unwrap();

        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("location"), Some("http://example.com:8080/x"));
        assert_eq!(headers.get("x-dup"), Some("2"));
        assert_eq!(headers.len(), 3);

        let names: Vec<_> = headers.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["content-type", "location", "x-dup"]);
    }

    #[tokio::test]
    async fn test_read_headers_eof() {
        let mut r = reader(b"Content-Type: text/html\r\n");
        assert!(matches!(
            read_headers(&mut r, false).await,
            Err(FetchError::UnexpectedEof {
                phase: Phase::Headers
            })
        ));
    }

    #[test]
    fn test_framing_decision() {
        let ok = status(200);

        let headers: Headers = [("transfer-encoding", "chunked"), ("content-length", "5")]
            .into_iter()
            .collect();
        assert_eq!(
            BodyFraming::from_headers(&ok, &headers).unwrap(),
            BodyFraming::Chunked
        );

        let headers: Headers = [("content-length", " 42 ")].into_iter().collect();
        assert_eq!(
            BodyFraming::from_headers(&ok, &headers).unwrap(),
            BodyFraming::Length(42)
        );

        let headers: Headers = [("transfer-encoding", "Chunked"), ("content-length", "1")]
            .into_iter()
            .collect();
        assert_eq!(
            BodyFraming::from_headers(&ok, &headers).unwrap(),
            BodyFraming::Length(1)
        );

        let headers: Headers = [("content-length", "lots")].into_iter().collect();
        assert!(matches!(
            BodyFraming::from_headers(&ok, &headers),
            Err(FetchError::InvalidContentLength(_))
        ));
    }

    #[test]
    fn test_framing_ambiguous() {
        let headers: Headers = [("content-type", "text/html")].into_iter().collect();
        assert!(matches!(
            BodyFraming::from_headers(&status(200), &headers),
            Err(FetchError::AmbiguousBodyFraming)
        ));
        assert!(matches!(
            BodyFraming::from_headers(&status(302), &Headers::new()),
            Err(FetchError::AmbiguousBodyFraming)
        ));
        assert_eq!(
            BodyFraming::from_headers(&status(204), &Headers::new()).unwrap(),
            BodyFraming::Empty
        );
    }

    #[tokio::test]
    async fn test_read_chunked_wikipedia() {
        let mut r = reader(b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n");
        let body = read_chunked(&mut r).await.unwrap();
        assert_eq!(body, b"Wikipedia");
    }

    #[tokio::test]
    async fn test_read_chunked_extensions_and_uppercase_hex() {
        let mut data = b"A;name=value\r\n0123456789\r\n".to_vec();
        data.extend_from_slice(b"0\r\n\r\n");
        let mut r = reader(&data);
        let body = read_chunked(&mut r).await.unwrap();
        assert_eq!(body, b"0123456789");
    }

    #[tokio::test]
    async fn test_read_chunked_short_read() {
        let mut r = reader(b"a\r\nshort");
        assert!(matches!(
            read_chunked(&mut r).await,
            Err(FetchError::UnexpectedEof { phase: Phase::Body })
        ));

        let mut r = reader(b"4\r\nWiki\r\n");
        assert!(matches!(
            read_chunked(&mut r).await,
            Err(FetchError::UnexpectedEof {
                phase: Phase::ChunkSize
            })
        ));
    }

    #[tokio::test]
    async fn test_read_chunked_invalid_size() {
        let mut r = reader(b"zz\r\n");
        assert!(matches!(
            read_chunked(&mut r).await,
            Err(FetchError::InvalidChunkSize(_))
        ));
    }

    #[tokio::test]
    async fn test_read_body_content_length() {
        let mut r = reader(b"hello world");
        let body = read_body(&mut r, BodyFraming::Length(5)).await.unwrap();
        assert_eq!(body, b"hello");

        let mut r = reader(b"hi");
        assert!(matches!(
            read_body(&mut r, BodyFraming::Length(5)).await,
            Err(FetchError::UnexpectedEof { phase: Phase::Body })
        ));

        let mut r = reader(b"");
        assert!(read_body(&mut r, BodyFraming::Length(0)).await.unwrap().is_empty());
    }
}
