//! TCP connections with on-demand TLS

use crate::error::{FetchError, Phase, Result};
use crate::target::Target;
use rustls::pki_types::ServerName;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

/// A connected byte stream, plain or TLS-wrapped
///
/// Upstream parsing code only sees `AsyncRead + AsyncWrite`. Dropping a
/// `Connection` closes the socket; [`Connection::close`] additionally sends
/// TLS close_notify and shuts down the write half.
pub enum Connection {
    /// Plain TCP
    Plain(TcpStream),
    /// TLS session over TCP
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    /// True if the stream is TLS-wrapped
    pub fn is_tls(&self) -> bool {
        matches!(self, Connection::Tls(_))
    }

    /// Shut the stream down. Errors are ignored; the socket is released
    /// when `self` drops either way.
    pub async fn close(mut self) {
        if let Err(e) = self.shutdown().await {
            debug!("Connection shutdown failed: {}", e);
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match &mut *self {
            Connection::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match &mut *self {
            Connection::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Connection::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Connection::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Connection::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Opens connections, upgrading to TLS for secure targets
///
/// Server certificates are verified against the Mozilla root store from
/// `webpki-roots`, with the target host as server name.
#[derive(Clone)]
pub struct Connector {
    tls: TlsConnector,
}

impl Connector {
    /// Create a connector with the bundled root store
    pub fn new() -> Result<Self> {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(FetchError::TlsConfig)?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(Self::with_tls_config(config))
    }

    /// Create a connector with a caller-supplied TLS configuration
    pub fn with_tls_config(config: ClientConfig) -> Self {
        Self {
            tls: TlsConnector::from(Arc::new(config)),
        }
    }

    /// Connect to the target's host and port
    pub async fn connect(&self, target: &Target) -> Result<Connection> {
        let host = target.host();
        let port = target.port();

        debug!(host, port, "Connecting");
        let tcp = TcpStream::connect((host, port))
            .await
            .map_err(|source| FetchError::Connection {
                host: host.to_string(),
                phase: Phase::Connect,
                source,
            })?;
        // Requests go out in a single write; no reason to wait on Nagle
        if let Err(e) = tcp.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        if !target.is_secure() {
            return Ok(Connection::Plain(tcp));
        }

        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", host, e)))?;

        debug!(host, "Starting TLS handshake");
        let tls = self
            .tls
            .connect(server_name, tcp)
            .await
            .map_err(|source| FetchError::Connection {
                host: host.to_string(),
                phase: Phase::Handshake,
                source,
            })?;

        Ok(Connection::Tls(Box::new(tls)))
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector").finish_non_exhaustive()
    }
}
