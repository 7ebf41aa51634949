//! go2web - a small HTTP/1.1 client built directly on TCP and TLS sockets
//!
//! The library fetches a URL with a hand-written request, parses the
//! response (status line, headers, chunked or length-delimited body),
//! reverses `gzip`/`deflate`/`br` content coding and decodes the text.
//!
//! ## Pieces
//!
//! - [`Client`] performs a single exchange ([`Client::fetch`]) or follows
//!   redirects up to a budget ([`Client::fetch_following`])
//! - [`Target`] normalizes user input into an http/https URL
//! - [`DiskCache`] stores decoded bodies keyed by URL without query
//! - [`extract`] turns HTML into printable lines
//! - [`search`] builds search-engine queries and harvests result links
//!
//! ```no_run
//! # async fn run() -> go2web::Result<()> {
//! use go2web::{Client, Config, Target};
//!
//! let client = Client::new(&Config::default())?;
//! let response = client.fetch_following(&Target::parse("example.com")?).await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod connection;
pub mod decode;
mod error;
pub mod extract;
mod headers;
pub mod line;
mod redirect;
pub mod response;
pub mod search;
pub mod target;

pub use cache::{Cache, CacheKey, DiskCache, NoCache};
pub use client::Client;
pub use config::{Config, TextEncoding};
pub use connection::{Connection, Connector};
pub use error::{FetchError, Phase, Result};
pub use headers::Headers;
pub use response::{Response, Status, StatusClass};
pub use search::SearchResult;
pub use target::Target;

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = "go2web client";
