//! CRLF line reader over a buffered byte stream

use crate::config::TextEncoding;
use crate::error::{FetchError, Phase, Result};
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};

/// Maximum length of a single protocol line, excluding the CRLF terminator
pub const MAX_LINE_LENGTH: usize = 8196;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Reads CRLF-terminated lines and exact byte counts from a stream
///
/// All text-protocol parsing (status line, headers, chunk sizes) goes
/// through [`LineReader::read_line`]. Body bytes are read with
/// [`LineReader::read_exact`] from the same buffer, so nothing read ahead
/// for a line is lost.
pub struct LineReader<R> {
    inner: BufReader<R>,
    encoding: TextEncoding,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Wrap a stream, decoding lines with `encoding`
    pub fn new(stream: R, encoding: TextEncoding) -> Self {
        Self {
            inner: BufReader::new(stream),
            encoding,
        }
    }

    /// Read one line, returning it without the trailing CRLF
    ///
    /// A bare LF is kept as line content; only CR immediately followed by
    /// LF terminates. Fails with `LineTooLong` once the line exceeds
    /// [`MAX_LINE_LENGTH`] bytes and with `UnexpectedEof` if the stream
    /// ends first.
    pub async fn read_line(&mut self, phase: Phase) -> Result<String> {
        let mut line = Vec::with_capacity(128);

        loop {
            let byte = self
                .inner
                .read_u8()
                .await
                .map_err(|e| FetchError::read(phase, e))?;
            line.push(byte);

            if byte == LF && line.len() >= 2 && line[line.len() - 2] == CR {
                line.truncate(line.len() - 2);
                return Ok(self.encoding.decode(&line));
            }

            // One extra byte of slack for a CR still waiting on its LF
            if line.len() > MAX_LINE_LENGTH + 1 {
                return Err(FetchError::LineTooLong {
                    phase,
                    limit: MAX_LINE_LENGTH,
                });
            }
        }
    }

    /// Read exactly `len` raw bytes, appending them to `buf`
    pub async fn read_exact(&mut self, buf: &mut Vec<u8>, len: usize, phase: Phase) -> Result<()> {
        // Grows with the data actually received, not the declared length
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(buf)
            .await
            .map_err(|e| FetchError::read(phase, e))?;
        if read < len {
            return Err(FetchError::UnexpectedEof { phase });
        }
        Ok(())
    }

    /// Text encoding used for lines
    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Return the underlying stream, discarding any buffered bytes
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}
