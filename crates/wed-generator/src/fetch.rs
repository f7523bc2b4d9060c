//! Content fetching for the `embed` helper.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::debug;

/// Source of embedded content.
pub trait ContentFetcher: Send + Sync {
    /// Fetch the raw bytes behind a URL or path.
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String>;
}

/// Fetches `http(s)://` references over the network and everything else from
/// the filesystem, relative to a base directory.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    base: PathBuf,
}

impl HttpFetcher {
    /// Create a fetcher resolving relative paths against `base`.
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn fetch_url(url: &str) -> Result<Vec<u8>, String> {
        let response = reqwest::blocking::get(url).map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }

        let bytes = response.bytes().map_err(|e| e.to_string())?;
        Ok(bytes.to_vec())
    }

    fn fetch_path(&self, reference: &str) -> Result<Vec<u8>, String> {
        let path = Path::new(reference);
        let full = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base.join(path)
        };
        fs::read(&full).map_err(|e| format!("{}: {e}", full.display()))
    }
}

impl ContentFetcher for HttpFetcher {
    fn fetch(&self, reference: &str) -> Result<Vec<u8>, String> {
        debug!(reference, "fetching embedded content");
        if reference.starts_with("http://") || reference.starts_with("https://") {
            Self::fetch_url(reference)
        } else {
            self.fetch_path(reference)
        }
    }
}
