//! Content-Encoding reversal

use crate::config::TextEncoding;
use crate::error::{FetchError, Result};
use std::io::Read;
use std::str::FromStr;
use tracing::debug;

/// Brotli decoder buffer size
const BROTLI_BUFFER_SIZE: usize = 4096;

/// A single content coding this client can reverse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// No transform
    Identity,
    /// gzip (RFC 1952)
    Gzip,
    /// deflate; raw DEFLATE, or zlib-wrapped when the stream carries a zlib header
    Deflate,
    /// Brotli
    Brotli,
}

impl ContentEncoding {
    /// Header token for this coding
    pub fn as_str(self) -> &'static str {
        match self {
            ContentEncoding::Identity => "identity",
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Deflate => "deflate",
            ContentEncoding::Brotli => "br",
        }
    }

    /// Parse a `Content-Encoding` header value into the codings applied,
    /// in the order the server applied them. Absent means identity.
    pub fn from_header(value: Option<&str>) -> Result<Vec<Self>> {
        let Some(value) = value else {
            return Ok(vec![ContentEncoding::Identity]);
        };

        value
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::parse)
            .collect()
    }

    /// Reverse this coding
    pub fn decode(self, data: &[u8]) -> Result<Vec<u8>> {
        let mut decoded = Vec::with_capacity(data.len());
        let result = match self {
            ContentEncoding::Identity => return Ok(data.to_vec()),
            ContentEncoding::Gzip => {
                flate2::read::GzDecoder::new(data).read_to_end(&mut decoded)
            }
            ContentEncoding::Deflate if has_zlib_header(data) => {
                flate2::read::ZlibDecoder::new(data).read_to_end(&mut decoded)
            }
            ContentEncoding::Deflate => {
                flate2::read::DeflateDecoder::new(data).read_to_end(&mut decoded)
            }
            ContentEncoding::Brotli => {
                brotli::Decompressor::new(data, BROTLI_BUFFER_SIZE).read_to_end(&mut decoded)
            }
        };

        result.map_err(|source| FetchError::Decode {
            encoding: self.as_str(),
            source,
        })?;
        Ok(decoded)
    }
}

impl FromStr for ContentEncoding {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "identity" => Ok(ContentEncoding::Identity),
            "gzip" | "x-gzip" => Ok(ContentEncoding::Gzip),
            "deflate" => Ok(ContentEncoding::Deflate),
            "br" => Ok(ContentEncoding::Brotli),
            _ => Err(FetchError::UnsupportedEncoding(s.trim().to_string())),
        }
    }
}

/// RFC 1950 header check: CM = 8 and the first two bytes are a multiple of 31
fn has_zlib_header(data: &[u8]) -> bool {
    match data {
        [cmf, flg, ..] => {
            cmf & 0x0F == 8 && ((u16::from(*cmf) << 8) | u16::from(*flg)) % 31 == 0
        }
        _ => false,
    }
}

/// Reverse every coding named in `content_encoding` and decode the text
///
/// Takes ownership of the raw body; it is dropped once decoded.
pub fn decode_body(
    body: Vec<u8>,
    content_encoding: Option<&str>,
    text: TextEncoding,
) -> Result<String> {
    let codings = ContentEncoding::from_header(content_encoding)?;

    let mut bytes = body;
    for coding in codings.into_iter().rev() {
        if coding != ContentEncoding::Identity {
            debug!(encoding = coding.as_str(), len = bytes.len(), "Decompressing body");
            bytes = coding.decode(&bytes)?;
        }
    }

    Ok(text.decode(&bytes))
}
