//! Disk cache for decoded response bodies
//!
//! One file per key under a cache directory. Entries carry no metadata and
//! never expire; a hit is served verbatim until [`Cache::clear`] runs.

use crate::config::TextEncoding;
use crate::error::{FetchError, Result};
use crate::target::Target;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Suffix of in-progress writes. `+` is always escaped in entry names, so
/// no entry can end with it.
const TEMP_SUFFIX: &str = "+tmp";

/// Longest entry file name; longer keys keep a prefix plus a digest
const MAX_FILE_NAME_LEN: usize = 200;

/// Storage for decoded response text, keyed by target
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up the text stored for `target`
    async fn get(&self, target: &Target) -> Result<Option<String>>;

    /// Store `text` for `target`, replacing any previous entry
    async fn put(&self, target: &Target, text: &str) -> Result<()>;

    /// Remove every entry, returning how many were removed
    async fn clear(&self) -> Result<usize>;
}

/// Which parts of the URL form the cache key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheKey {
    /// Scheme, host, port and path; query strings share one entry
    #[default]
    Path,
    /// Everything but the fragment
    FullUrl,
}

impl CacheKey {
    /// Key string for `target`
    pub fn key(self, target: &Target) -> String {
        match self {
            CacheKey::Path => target.without_query(),
            CacheKey::FullUrl => target.without_fragment(),
        }
    }
}

/// File-per-entry cache in a directory
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    encoding: TextEncoding,
    key: CacheKey,
}

impl DiskCache {
    /// Cache rooted at `dir`, created on first write
    pub fn new(dir: impl Into<PathBuf>, encoding: TextEncoding) -> Self {
        Self {
            dir: dir.into(),
            encoding,
            key: CacheKey::default(),
        }
    }

    /// Choose how keys are derived from targets
    pub fn with_key(mut self, key: CacheKey) -> Self {
        self.key = key;
        self
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding the entry for `target`
    pub fn entry_path(&self, target: &Target) -> PathBuf {
        self.dir.join(file_name(&self.key.key(target)))
    }

    async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| FetchError::cache(&self.dir, e))
    }
}

#[async_trait]
impl Cache for DiskCache {
    async fn get(&self, target: &Target) -> Result<Option<String>> {
        let path = self.entry_path(target);
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(path = %path.display(), "Cache hit");
                Ok(Some(self.encoding.decode(&bytes)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(FetchError::cache(path, e)),
        }
    }

    async fn put(&self, target: &Target, text: &str) -> Result<()> {
        self.ensure_dir().await?;

        let path = self.entry_path(target);
        let mut temp = path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        fs::write(&temp, self.encoding.encode(text))
            .await
            .map_err(|e| FetchError::cache(&temp, e))?;
        fs::rename(&temp, &path)
            .await
            .map_err(|e| FetchError::cache(&path, e))?;

        debug!(path = %path.display(), "Cached response");
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                self.ensure_dir().await?;
                return Ok(0);
            }
            Err(e) => return Err(FetchError::cache(&self.dir, e)),
        };

        let mut count = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FetchError::cache(&self.dir, e))?
        {
            let is_file = entry
                .file_type()
                .await
                .map(|t| t.is_file())
                .unwrap_or(false);
            let is_temp = entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX);
            if is_file && !is_temp {
                count += 1;
            }
        }

        fs::remove_dir_all(&self.dir)
            .await
            .map_err(|e| FetchError::cache(&self.dir, e))?;
        self.ensure_dir().await?;

        debug!(count, dir = %self.dir.display(), "Cleared cache");
        Ok(count)
    }
}

/// Cache that stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get(&self, _target: &Target) -> Result<Option<String>> {
        Ok(None)
    }

    async fn put(&self, _target: &Target, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Percent-encode a key into a single path component
///
/// Everything except ASCII alphanumerics and `-._~` is escaped, so the
/// result never contains a path separator. Names longer than
/// [`MAX_FILE_NAME_LEN`] are cut and suffixed with `+` and the SHA-256 of
/// the full key.
fn file_name(key: &str) -> String {
    let mut out = String::with_capacity(key.len() * 3);
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }

    if out.len() <= MAX_FILE_NAME_LEN {
        return out;
    }

    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    // Escaped output is ASCII, so any byte offset is a char boundary
    out.truncate(MAX_FILE_NAME_LEN - digest.len() - 1);
    out.push('+');
    out.push_str(&digest);
    out
}
