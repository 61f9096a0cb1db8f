//! Model download functionality
//!
//! Models are fetched with a blocking HTTP client into a temporary file next to
//! their final location and only renamed into place once complete, so an
//! interrupted download never leaves a truncated model in the cache.

use crate::cache::ModelCache;
use crate::error::{BgRemovalError, Result};
use crate::models::ModelKind;
use crate::tracing_config::spans;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Model downloader for fetching models into the cache
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a new model downloader
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300)) // 5 minute timeout
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Download a model into the cache and return its path
    ///
    /// When `expected_sha256` is given the file is verified before it is moved
    /// into place.
    ///
    /// # Errors
    /// - Network or HTTP status errors
    /// - File system errors while writing the cache
    /// - Digest mismatch
    pub fn download_model(&self, kind: ModelKind, expected_sha256: Option<&str>) -> Result<PathBuf> {
        let url = kind.download_url();
        let final_path = self.cache.get_model_path(kind);
        let _span = spans::download(&url, &final_path).entered();

        tracing::info!(model = %kind, url = %url, "Downloading model");

        let mut temp_file = tempfile::Builder::new()
            .prefix(&format!(".{}-", kind.name()))
            .suffix(".part")
            .tempfile_in(self.cache.cache_dir())
            .map_err(|e| {
                BgRemovalError::file_io_error(
                    "create temporary download file in",
                    self.cache.cache_dir(),
                    &e,
                )
            })?;

        let mut response = self
            .client
            .get(&url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .map_err(|e| BgRemovalError::network_error(format!("Failed to download {url}"), e))?;

        let downloaded = response
            .copy_to(temp_file.as_file_mut())
            .map_err(|e| BgRemovalError::network_error(format!("Failed to read {url}"), e))?;

        if downloaded == 0 {
            return Err(BgRemovalError::network_error(
                format!("Failed to download {url}"),
                "server returned an empty body",
            ));
        }

        temp_file
            .as_file_mut()
            .flush()
            .and_then(|()| temp_file.as_file().sync_all())
            .map_err(|e| BgRemovalError::file_io_error("flush", temp_file.path(), &e))?;

        tracing::debug!(bytes = downloaded, "Model download complete");

        if !Self::verify_file_integrity(temp_file.path(), expected_sha256)? {
            return Err(BgRemovalError::model(format!(
                "Downloaded {} does not match REMOVE_BG_MODEL_SHA256",
                kind.file_name()
            )));
        }

        temp_file.persist(&final_path).map_err(|e| {
            BgRemovalError::file_io_error("move downloaded model to", &final_path, &e.error)
        })?;

        tracing::info!(model = %kind, path = %final_path.display(), "Model cached");
        Ok(final_path)
    }

    /// Lowercase hex SHA-256 of a file
    ///
    /// # Errors
    /// - File cannot be read
    pub fn sha256_file(path: &Path) -> Result<String> {
        let mut file = File::open(path)
            .map_err(|e| BgRemovalError::file_io_error("open file for hashing", path, &e))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)
            .map_err(|e| BgRemovalError::file_io_error("hash", path, &e))?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Verify the integrity of a file using SHA-256
    ///
    /// Returns `Ok(true)` when no digest is expected.
    ///
    /// # Errors
    /// - File cannot be read
    pub fn verify_file_integrity(file_path: &Path, expected_hash: Option<&str>) -> Result<bool> {
        let Some(expected) = expected_hash else {
            return Ok(true);
        };

        let actual_hash = Self::sha256_file(file_path)?;
        tracing::debug!(path = %file_path.display(), sha256 = %actual_hash, "Model digest");

        if actual_hash.eq_ignore_ascii_case(expected) {
            Ok(true)
        } else {
            tracing::warn!(
                path = %file_path.display(),
                expected = %expected,
                actual = %actual_hash,
                "File integrity check failed"
            );
            Ok(false)
        }
    }

    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}
