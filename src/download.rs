//! Model weight fetching
//!
//! Byte-exact retrieval of the matte network weights from a URL or a local
//! path, with progress reporting, an on-disk cache for downloaded files, and
//! optional SHA-256 verification. Every failure is reported as a
//! `FetchFailure`, which only disables the backend that needed the weights.

use crate::config::ModelSource;
use crate::error::{PortraitError, Result};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    /// Create a byte progress bar when the CLI is compiled in
    #[must_use]
    pub fn for_download(show_progress: bool) -> Self {
        if !show_progress {
            return Self::NoOp;
        }
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            let style = ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
                )
                .map_or_else(|_| ProgressStyle::default_bar(), |s| s.progress_chars("#>-"));
            pb.set_style(style);
            Self::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            Self::NoOp
        }
    }

    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {},
        }
    }

    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

/// Lowercase hex SHA-256 of a byte slice
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Check that a model URL is an absolute HTTP(S) URL
///
/// # Errors
/// - `FetchFailure` for any other scheme or a missing host
pub fn validate_model_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| PortraitError::fetch_failure(url, "only http(s) URLs are supported"))?;

    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return Err(PortraitError::fetch_failure(url, "URL has no host"));
    }
    Ok(())
}

/// Fetches model weights and caches downloads on disk
#[derive(Debug, Clone)]
pub struct ModelFetcher {
    client: Client,
    cache_dir: Option<PathBuf>,
}

impl ModelFetcher {
    /// Create a fetcher caching into the platform cache directory
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 minute timeout
            .build()
            .map_err(|e| PortraitError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache_dir: Self::default_cache_dir(),
        })
    }

    /// Use a specific cache directory, or disable caching with `None`
    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: Option<PathBuf>) -> Self {
        self.cache_dir = cache_dir;
        self
    }

    /// `<platform cache>/badge-portrait/models`
    #[must_use]
    pub fn default_cache_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|dir| dir.join("badge-portrait").join("models"))
    }

    #[must_use]
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    /// Cache location for a URL, keyed by the URL's hash
    #[must_use]
    pub fn cache_path(&self, url: &str) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.onnx", sha256_hex(url.as_bytes()))))
    }

    /// Fetch the model bytes
    ///
    /// # Errors
    /// - `FetchFailure` for unreadable paths, invalid URLs, network errors,
    ///   non-success HTTP status or checksum mismatch
    pub async fn fetch(
        &self,
        source: &ModelSource,
        expected_sha256: Option<&str>,
        show_progress: bool,
    ) -> Result<Vec<u8>> {
        let source_name = source.to_string();
        let bytes = match source {
            ModelSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| PortraitError::fetch_failure(&source_name, e.to_string()))?,
            ModelSource::Url(url) => self.fetch_url(url, show_progress).await?,
        };

        if let Some(expected) = expected_sha256 {
            let actual = sha256_hex(&bytes);
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(PortraitError::fetch_failure(
                    source_name,
                    format!("checksum mismatch: expected {expected}, got {actual}"),
                ));
            }
            log::debug!("Model checksum verified: {actual}");
        }

        log::info!("Fetched model {source_name} ({} bytes)", bytes.len());
        Ok(bytes)
    }

    async fn fetch_url(&self, url: &str, show_progress: bool) -> Result<Vec<u8>> {
        validate_model_url(url)?;

        let cache_path = self.cache_path(url);
        if let Some(path) = cache_path.as_deref() {
            if path.exists() {
                log::info!("Model already cached: {}", path.display());
                return tokio::fs::read(path)
                    .await
                    .map_err(|e| PortraitError::fetch_failure(url, e.to_string()));
            }
        }

        let progress = ProgressIndicator::for_download(show_progress);
        progress.set_message(format!("Downloading {url}"));

        match self.download(url, &progress).await {
            Ok(bytes) => {
                progress.finish_with_message("✅ Downloaded model".to_string());
                if let Some(path) = cache_path.as_deref() {
                    if let Err(e) = Self::store_in_cache(path, &bytes).await {
                        log::warn!("Failed to cache model: {e}");
                    }
                }
                Ok(bytes)
            },
            Err(e) => {
                progress.finish_with_message("❌ Download failed".to_string());
                Err(e)
            },
        }
    }

    /// Download a URL into memory with progress reporting
    async fn download(&self, url: &str, progress: &ProgressIndicator) -> Result<Vec<u8>> {
        log::info!("Downloading model from: {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortraitError::fetch_failure(url, e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortraitError::fetch_failure(
                url,
                format!("HTTP error {}", response.status()),
            ));
        }

        let total_size = response.content_length();
        if let Some(total) = total_size {
            progress.set_length(total);
        }

        let mut stream = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let mut bytes = Vec::with_capacity(total_size.unwrap_or(0) as usize);
        let mut buffer = vec![0; 8192];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| PortraitError::fetch_failure(url, e.to_string()))?;
            if bytes_read == 0 {
                break;
            }
            bytes.extend_from_slice(buffer.get(..bytes_read).unwrap_or(&[]));
            progress.set_position(bytes.len() as u64);
        }

        log::debug!("Downloaded {} bytes from {url}", bytes.len());
        Ok(bytes)
    }

    /// Write through a temp file and rename so readers never see a partial model
    async fn store_in_cache(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PortraitError::file_io_error("create cache directory", parent, &e))?;
        }

        let temp_path = path.with_extension("onnx.partial");
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| PortraitError::file_io_error("create file", &temp_path, &e))?;
        file.write_all(bytes)
            .await
            .map_err(|e| PortraitError::file_io_error("write to file", &temp_path, &e))?;
        file.flush()
            .await
            .map_err(|e| PortraitError::file_io_error("flush file", &temp_path, &e))?;
        drop(file);

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| PortraitError::file_io_error("move model into cache", path, &e))?;
        log::debug!("Cached model at {}", path.display());
        Ok(())
    }
}
