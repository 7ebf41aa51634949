//! Error types for go2web

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using [`FetchError`]
pub type Result<T> = std::result::Result<T, FetchError>;

/// Stage of a single request/response exchange
///
/// Attached to transport and parse errors so a failure can be logged with
/// where in the exchange it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// DNS resolution and TCP connect
    Connect,
    /// TLS client handshake
    Handshake,
    /// Writing the request bytes
    WriteRequest,
    /// Reading the status line
    StatusLine,
    /// Reading header lines
    Headers,
    /// Reading a chunk-size line
    ChunkSize,
    /// Reading body bytes
    Body,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Connect => "connect",
            Phase::Handshake => "TLS handshake",
            Phase::WriteRequest => "request write",
            Phase::StatusLine => "status line",
            Phase::Headers => "headers",
            Phase::ChunkSize => "chunk size",
            Phase::Body => "body",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during fetch, cache and config operations
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or is not http/https
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// DNS, TCP connect or TLS handshake failure
    #[error("Failed to connect to {host} ({phase})")]
    Connection {
        host: String,
        phase: Phase,
        #[source]
        source: io::Error,
    },

    /// TLS client configuration could not be built
    #[error("Failed to build TLS configuration")]
    TlsConfig(#[source] rustls::Error),

    /// A protocol line exceeded the line length cap
    #[error("Line too long while reading {phase} (limit {limit} bytes)")]
    LineTooLong { phase: Phase, limit: usize },

    /// Stream ended before the expected data arrived
    #[error("Connection closed while reading {phase}")]
    UnexpectedEof { phase: Phase },

    /// Other read/write failure on an established connection
    #[error("I/O error during {phase}")]
    Io {
        phase: Phase,
        #[source]
        source: io::Error,
    },

    /// Status line does not match `HTTP/<version> <code> <message>`
    #[error("Invalid status line: {0:?}")]
    InvalidStatusLine(String),

    /// Content-Length header is not a non-negative integer
    #[error("Invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    /// Chunk-size line is not a hexadecimal number
    #[error("Invalid chunk size: {0:?}")]
    InvalidChunkSize(String),

    /// Response declared neither chunked transfer coding nor Content-Length
    #[error("Ambiguous body framing: neither Transfer-Encoding: chunked nor Content-Length present")]
    AmbiguousBodyFraming,

    /// Content-Encoding value this client cannot reverse
    #[error("Unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    /// Decompression of the body failed
    #[error("Failed to decode {encoding} body")]
    Decode {
        encoding: &'static str,
        #[source]
        source: io::Error,
    },

    /// Request did not complete before the deadline
    #[error("Request to {host} timed out after {}ms", timeout.as_millis())]
    Timeout { host: String, timeout: Duration },

    /// Still redirecting after the redirect budget ran out
    #[error("Reached max redirect count ({max})")]
    MaxRedirectsExceeded { max: u32 },

    /// Redirect response without a usable Location header
    #[error("Redirect {status} from {url} has no usable Location header")]
    MalformedRedirect { status: u16, url: String },

    /// Disk cache read/write failure
    #[error("Cache error at {}", path.display())]
    Cache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file could not be read
    #[error("Failed to read config file {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid JSON for [`Config`](crate::Config)
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl FetchError {
    /// Map a read error to `UnexpectedEof` or `Io` for the given phase
    pub(crate) fn read(phase: Phase, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            FetchError::UnexpectedEof { phase }
        } else {
            FetchError::Io { phase, source: err }
        }
    }

    /// Create a cache error for the given path
    pub(crate) fn cache(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FetchError::Cache {
            path: path.into(),
            source,
        }
    }

    /// True for failures the caller may reasonably retry by hand
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Connection { .. }
                | FetchError::Timeout { .. }
                | FetchError::UnexpectedEof { .. }
        )
    }
}
