// src/source/mod.rs

//! Source preparation: fetch, verify and unpack the source archive
//!
//! Archives are cached under their checksum (`<cache>/<algo>_<hex>`), so a
//! verified download is reused by later runs. Nothing is unpacked until the
//! checksum matches.

mod archive;

pub use archive::{ArchiveFormat, unpack};

use crate::error::{Error, Result};
use crate::hash::{Hash, hash_file};
use crate::manifest::Manifest;
use indicatif::ProgressBar;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum download attempts
const MAX_RETRIES: u32 = 3;

/// Base retry delay in milliseconds; multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Downloads and caches source archives
pub struct SourceFetcher {
    client: Client,
    cache_dir: PathBuf,
    max_retries: u32,
    retry_delay: Duration,
    progress: Option<ProgressBar>,
}

impl SourceFetcher {
    /// Create a fetcher caching into `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("formulary/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::FetchFailed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache_dir: cache_dir.into(),
            max_retries: MAX_RETRIES,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            progress: None,
        })
    }

    /// Report download progress on this bar
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Override the retry policy
    pub fn with_retries(mut self, max_retries: u32, delay: Duration) -> Self {
        self.max_retries = max_retries.max(1);
        self.retry_delay = delay;
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where the archive with this checksum lives in the cache
    pub fn cache_path(&self, checksum: &Hash) -> PathBuf {
        self.cache_dir.join(checksum.cache_key())
    }

    /// Fetch the manifest's source archive and return its verified cache path
    pub fn fetch(&self, manifest: &Manifest) -> Result<PathBuf> {
        let url = manifest.source_url().ok_or_else(|| {
            Error::FetchFailed(format!("{} declares no source URL", manifest.name()))
        })?;
        let checksum = manifest.checksum().ok_or_else(|| {
            Error::malformed("source.checksum", "required when a source URL is given")
        })?;

        self.fetch_url(url, checksum)
    }

    /// Fetch `url` into the cache and verify it against `expected`
    ///
    /// `file://` URLs and bare paths are copied rather than downloaded.
    pub fn fetch_url(&self, url: &str, expected: &Hash) -> Result<PathBuf> {
        let dest = self.cache_path(expected);

        if dest.is_file() {
            match verify_file(&dest, expected) {
                Ok(()) => {
                    info!("Using cached source {}", dest.display());
                    return Ok(dest);
                }
                Err(Error::ChecksumMismatch { .. }) => {
                    warn!("Cached source {} is corrupt, fetching again", dest.display());
                }
                Err(e) => return Err(e),
            }
        }

        fs::create_dir_all(&self.cache_dir)?;

        match local_path(url) {
            Some(path) => self.copy_local(&path, &dest)?,
            None => self.download(url, &dest)?,
        }

        verify_file(&dest, expected)?;
        info!("Verified {} ({})", url, expected);
        Ok(dest)
    }

    fn copy_local(&self, src: &Path, dest: &Path) -> Result<()> {
        info!("Copying {} to {}", src.display(), dest.display());
        let temp_path = dest.with_extension("tmp");
        fs::copy(src, &temp_path).map_err(|e| {
            Error::FetchFailed(format!("Failed to copy {}: {e}", src.display()))
        })?;
        fs::rename(&temp_path, dest)?;
        Ok(())
    }

    /// Download with retry support
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        info!("Downloading {} to {}", url, dest.display());

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::FetchFailed(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    let total_size = response.content_length().unwrap_or(0);
                    let temp_path = dest.with_extension("tmp");
                    let mut file = File::create(&temp_path)?;

                    match self.stream_to_file(response, &mut file, total_size) {
                        Ok(downloaded) => {
                            debug!("Downloaded {} bytes", downloaded);
                            fs::rename(&temp_path, dest)?;
                            return Ok(());
                        }
                        Err(e) => {
                            let _ = fs::remove_file(&temp_path);
                            if attempt >= self.max_retries {
                                return Err(Error::FetchFailed(format!(
                                    "Failed to download {url} after {attempt} attempts: {e}"
                                )));
                            }
                            warn!("Download attempt {} interrupted: {}, retrying...", attempt, e);
                        }
                    }
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::FetchFailed(format!(
                            "Failed to download {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Download attempt {} failed: {}, retrying...", attempt, e);
                }
            }
            std::thread::sleep(self.retry_delay * attempt);
        }
    }

    fn stream_to_file(
        &self,
        mut response: reqwest::blocking::Response,
        file: &mut File,
        total_size: u64,
    ) -> io::Result<u64> {
        if let Some(pb) = &self.progress {
            if total_size > 0 {
                pb.set_length(total_size);
            }
            pb.set_position(0);
        }

        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];
        loop {
            let bytes_read = response.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            file.write_all(&buffer[..bytes_read])?;
            downloaded += bytes_read as u64;

            if let Some(pb) = &self.progress {
                pb.set_position(downloaded);
            }
        }

        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        Ok(downloaded)
    }
}

/// Check `path` against `expected`, removing the file on mismatch
pub fn verify_file(path: &Path, expected: &Hash) -> Result<()> {
    let actual = hash_file(expected.algorithm, path)?;
    if actual == *expected {
        return Ok(());
    }

    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove {}: {}", path.display(), e);
    }
    Err(Error::ChecksumMismatch {
        path: path.display().to_string(),
        expected: expected.to_prefixed_string(),
        actual: actual.to_prefixed_string(),
    })
}

/// Local file behind a `file://` URL or bare path
fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") {
        return None;
    }
    Some(PathBuf::from(url))
}
