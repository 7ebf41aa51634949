//! Client configuration and text encoding

use crate::error::{FetchError, Result};
use crate::search::DEFAULT_SEARCH_ENGINE;
use crate::DEFAULT_USER_AGENT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default number of redirects followed before giving up
pub const DEFAULT_MAX_REDIRECTS: u32 = 10;

/// Default request timeout in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Default cache directory, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = ".go2web-cache";

/// Text encoding used for request serialization, protocol lines,
/// decoded bodies and cache files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8, invalid sequences replaced with U+FFFD
    #[default]
    #[serde(rename = "utf-8", alias = "utf8", alias = "UTF-8")]
    Utf8,
    /// ISO-8859-1, every byte maps to the code point of the same value
    #[serde(rename = "latin1", alias = "iso-8859-1", alias = "ISO-8859-1")]
    Latin1,
    /// 7-bit ASCII, bytes above 0x7F replaced with U+FFFD
    #[serde(rename = "ascii", alias = "us-ascii", alias = "ASCII")]
    Ascii,
}

impl TextEncoding {
    /// Decode bytes to text. Never fails; unmappable input is replaced.
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            TextEncoding::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Ascii => bytes
                .iter()
                .map(|&b| {
                    if b.is_ascii() {
                        char::from(b)
                    } else {
                        char::REPLACEMENT_CHARACTER
                    }
                })
                .collect(),
        }
    }

    /// Encode text to bytes. Characters outside the charset become `?`.
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }

    /// Canonical label
    pub fn as_str(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Ascii => "ascii",
        }
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            "latin1" | "latin-1" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            "ascii" | "us-ascii" => Ok(TextEncoding::Ascii),
            other => Err(format!("Unknown text encoding: {}", other)),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// go2web configuration
///
/// Read from a JSON file with PascalCase keys, e.g.
///
/// ```json
/// { "MaxRedirects": 5, "RequestTimeout": 3000, "Encoding": "utf-8" }
/// ```
///
/// Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Config {
    /// Redirects followed before failing with `MaxRedirectsExceeded`
    pub max_redirects: u32,
    /// Request timeout in milliseconds, covering connect through body decode
    pub request_timeout: u64,
    /// Text encoding for the wire, bodies and cache files
    pub encoding: TextEncoding,
    /// Directory holding one file per cached URL
    pub cache_directory: PathBuf,
    /// Search URL template, `{query}` is replaced with the encoded terms
    pub search_engine: String,
    /// User-Agent header value
    pub user_agent: String,
    /// Log each response header as it is parsed
    #[serde(skip)]
    pub log_headers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_MS,
            encoding: TextEncoding::default(),
            cache_directory: PathBuf::from(DEFAULT_CACHE_DIR),
            search_engine: DEFAULT_SEARCH_ENGINE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            log_headers: false,
        }
    }
}

impl Config {
    /// Read configuration from a JSON file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| FetchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }
}
