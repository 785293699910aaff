//! File fetcher
//!
//! Streams a download target's source URL into its local path. Writes go to a
//! `.downloading` sibling which is renamed over the final path only after the
//! whole body has been written, so a crash or failed fetch never leaves a
//! partial file at the final location. Replays are idempotent: a target whose
//! final path already exists completes without network I/O.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::config::DownloadConfig;
use crate::error::FetchError;
use crate::types::{DownloadTarget, TargetKind};

/// Suffix appended to the final path while a download is in flight
const TEMP_SUFFIX: &str = ".downloading";

/// Streams download targets to local disk
pub struct FileFetcher {
    http: reqwest::Client,
}

impl FileFetcher {
    /// Build a fetcher with the configured download timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be constructed.
    pub fn new(config: &DownloadConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .build()?;
        Ok(Self { http })
    }

    /// Materialize one download target on local disk.
    ///
    /// Directory targets are created idempotently without network I/O. File
    /// targets whose final path already exists also complete without network
    /// I/O. On any failure the temp sibling is deleted best-effort and the
    /// error is returned.
    ///
    /// # Errors
    ///
    /// [`FetchError`] on HTTP, I/O, or cancellation failures.
    pub async fn fetch(
        &self,
        target: &DownloadTarget,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        match target.kind {
            TargetKind::Directory => {
                tokio::fs::create_dir_all(&target.to).await?;
                tracing::debug!(path = %target.to.display(), "Directory ensured");
                Ok(())
            }
            TargetKind::File => self.fetch_file(target, cancel).await,
        }
    }

    async fn fetch_file(
        &self,
        target: &DownloadTarget,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        if tokio::fs::try_exists(&target.to).await? {
            tracing::debug!(
                path = %target.to.display(),
                transfer_hash = %target.transfer_hash,
                "File already exists, skipping download"
            );
            return Ok(());
        }

        let url = target
            .from
            .as_deref()
            .ok_or_else(|| FetchError::MissingSource {
                path: target.to.clone(),
            })?;

        if let Some(parent) = target.to.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = temp_path(&target.to);
        match self.stream_to(url, &temp, cancel).await {
            Ok(()) => {
                tokio::fs::rename(&temp, &target.to).await?;
                tracing::debug!(
                    path = %target.to.display(),
                    transfer_hash = %target.transfer_hash,
                    "Download target written"
                );
                Ok(())
            }
            Err(e) => {
                // Best-effort temp cleanup; the error itself is what matters
                tokio::fs::remove_file(&temp).await.ok();
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        url: &str,
        temp: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(temp).await?;
        let mut stream = response.bytes_stream();
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(chunk) => file.write_all(&chunk?).await?,
                None => break,
            }
        }
        file.flush().await?;
        Ok(())
    }
}

/// Sibling path the body is streamed into before the final rename.
fn temp_path(to: &Path) -> PathBuf {
    let mut path = to.as_os_str().to_owned();
    path.push(TEMP_SUFFIX);
    PathBuf::from(path)
}
