//! Image downloading
//!
//! Image bodies are streamed into a hidden temporary file inside the target
//! directory and renamed onto their final name once the stream has completed.
//! An existing file with the same name is overwritten.

use crate::error::{HarvestError, Result};
use crate::models::ImageAsset;
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Boxed body reader returned by an [`ImageFetcher`]
pub type ImageBody = Box<dyn AsyncRead + Send + Unpin>;

/// Source of raw image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Open the body of the image at `url`
    ///
    /// # Errors
    /// - `HarvestError::Transport` on connection failure or non-success status
    async fn open(&self, url: &str) -> Result<ImageBody>;
}

/// Image fetcher backed by the shared HTTP client
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn open(&self, url: &str) -> Result<ImageBody> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| HarvestError::network_error(format!("Failed to download {}", url), e))?;

        if !response.status().is_success() {
            return Err(HarvestError::http_status(response.status(), url));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        Ok(Box::new(StreamReader::new(Box::pin(stream))))
    }
}

impl ImageAsset {
    /// Download this image into `target_dir` under [`ImageAsset::filename`]
    ///
    /// Returns the path of the saved file. Nothing is written under the final
    /// name unless the whole body was received.
    ///
    /// # Errors
    /// - `HarvestError::Transport` when the image cannot be retrieved
    /// - `HarvestError::Decode` when the canonical URL has no filename segment
    /// - `HarvestError::Io` when the file cannot be written
    pub async fn download<F>(&self, fetcher: &F, target_dir: &Path) -> Result<PathBuf>
    where
        F: ImageFetcher + ?Sized,
    {
        let file_name = self.filename();
        if file_name.is_empty() {
            return Err(HarvestError::decode(format!(
                "Image URL has no filename segment: {}",
                self.canonical_url()
            )));
        }

        let final_path = target_dir.join(file_name);
        let temp_path = target_dir.join(format!(".{}.part", file_name));
        log::debug!(
            "Downloading: {} -> {}",
            self.canonical_url(),
            final_path.display()
        );

        let mut body = fetcher.open(self.canonical_url()).await?;

        match write_body(&mut body, &temp_path).await {
            Ok(bytes_written) => {
                tokio::fs::rename(&temp_path, &final_path)
                    .await
                    .map_err(|e| {
                        HarvestError::file_io_error("move downloaded image into place", &final_path, &e)
                    })?;
                log::debug!(
                    "Downloaded {} bytes to {}",
                    bytes_written,
                    final_path.display()
                );
                Ok(final_path)
            },
            Err(e) => {
                if let Err(cleanup_err) = tokio::fs::remove_file(&temp_path).await {
                    if cleanup_err.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("Failed to cleanup temp file: {}", cleanup_err);
                    }
                }
                Err(e)
            },
        }
    }
}

/// Stream a body into `path`, returning the number of bytes written
async fn write_body(body: &mut ImageBody, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| HarvestError::file_io_error("create file", path, &e))?;

    let mut written = 0u64;
    let mut buffer = vec![0; 8192];

    loop {
        let bytes_read = tokio::io::AsyncReadExt::read(body, &mut buffer)
            .await
            .map_err(|e| HarvestError::network_error("Failed to read download stream", e))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(buffer.get(..bytes_read).unwrap_or(&[]))
            .await
            .map_err(|e| HarvestError::file_io_error("write to file", path, &e))?;

        written += bytes_read as u64;
    }

    file.flush()
        .await
        .map_err(|e| HarvestError::file_io_error("flush file", path, &e))?;

    Ok(written)
}
