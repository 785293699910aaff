//! put.io REST client
//!
//! Wire models for the put.io API plus the [`PutioClient`] capability trait
//! the orchestration core consumes. The trait exists so the core can be
//! exercised against an in-memory implementation in tests; production code
//! uses [`HttpPutioClient`].

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

use crate::config::{PutioConfig, RetryConfig};
use crate::error::{ApiError, Error, Result};
use crate::retry::with_retry;
use crate::types::{FileId, TransferId};

/// Status of a remote transfer
///
/// The remote side reports these as upper-case strings; comparison is
/// case-insensitive and unrecognized values map to [`TransferStatus::Unknown`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    /// Transfer is stopped
    Stopped,
    /// Download finished on the remote side
    Completed,
    /// Transfer failed remotely
    Error,
    /// Waiting for a hash check slot
    CheckWait,
    /// Remote side is preparing the download
    PreparingDownload,
    /// Hash check in progress
    Check,
    /// Finalizing the download
    Completing,
    /// Queued remotely
    Queued,
    /// Waiting in the remote queue
    InQueue,
    /// Downloading remotely
    Downloading,
    /// Waiting for a seed slot
    SeedingWait,
    /// Seeding to the swarm
    Seeding,
    /// A status string this client does not recognize
    Unknown,
}

impl TransferStatus {
    /// Parse a remote status string, case-insensitively.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "STOPPED" => TransferStatus::Stopped,
            "COMPLETED" => TransferStatus::Completed,
            "ERROR" => TransferStatus::Error,
            "CHECKWAIT" => TransferStatus::CheckWait,
            "PREPARING_DOWNLOAD" => TransferStatus::PreparingDownload,
            "CHECK" => TransferStatus::Check,
            "COMPLETING" => TransferStatus::Completing,
            "QUEUED" => TransferStatus::Queued,
            "IN_QUEUE" => TransferStatus::InQueue,
            "DOWNLOADING" => TransferStatus::Downloading,
            "SEEDINGWAIT" => TransferStatus::SeedingWait,
            "SEEDING" => TransferStatus::Seeding,
            _ => TransferStatus::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for TransferStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(TransferStatus::parse(&s))
    }
}

/// A transfer entity as reported by the remote listing
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteTransfer {
    /// Remote transfer identifier
    pub id: TransferId,
    /// BitTorrent infohash, when known
    #[serde(default)]
    pub hash: Option<String>,
    /// Human-readable label
    #[serde(default)]
    pub name: Option<String>,
    /// Total size in bytes
    #[serde(default)]
    pub size: Option<i64>,
    /// Bytes downloaded so far on the remote side
    #[serde(default)]
    pub downloaded: Option<i64>,
    /// Estimated seconds until remote completion
    #[serde(default)]
    pub estimated_time: Option<i64>,
    /// Remote lifecycle status
    pub status: TransferStatus,
    /// When the remote download started
    #[serde(default)]
    pub started_at: Option<NaiveDateTime>,
    /// When the remote download finished
    #[serde(default)]
    pub finished_at: Option<NaiveDateTime>,
    /// Root of the transfer's file tree; present once downloadable
    #[serde(default)]
    pub file_id: Option<FileId>,
    /// Folder the transfer was saved under
    #[serde(default)]
    pub save_parent_id: Option<FileId>,
    /// Source tag or URI the transfer was created from
    #[serde(default)]
    pub source: Option<String>,
    /// Whether the remote file tree still exists
    #[serde(default)]
    pub userfile_exists: bool,
    /// Remote error message, if the transfer failed
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RemoteTransfer {
    /// True once the remote side has materialized a file tree to download.
    pub fn is_downloadable(&self) -> bool {
        self.file_id.is_some()
    }
}

/// A file or folder in the remote file tree
#[derive(Clone, Debug, Deserialize)]
pub struct RemoteFile {
    /// Remote file identifier
    pub id: FileId,
    /// File or folder name
    pub name: String,
    /// MIME content type, when reported
    #[serde(default)]
    pub content_type: Option<String>,
    /// Remote type discriminator (`FOLDER`, `VIDEO`, ...)
    #[serde(default)]
    pub file_type: String,
}

impl RemoteFile {
    /// True when this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.file_type.eq_ignore_ascii_case("FOLDER")
    }

    /// True when this node is a video file.
    pub fn is_video(&self) -> bool {
        self.file_type.eq_ignore_ascii_case("VIDEO")
    }
}

/// One level of the remote file tree: a parent node and its direct children
#[derive(Clone, Debug, Deserialize)]
pub struct FileListing {
    /// The listed node itself
    pub parent: RemoteFile,
    /// Direct children; empty when `parent` is a file
    #[serde(default)]
    pub files: Vec<RemoteFile>,
}

/// Account details returned by the remote service
#[derive(Clone, Debug, Deserialize)]
pub struct AccountInfo {
    /// Account user name
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct TransfersResponse {
    transfers: Vec<RemoteTransfer>,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    transfer: RemoteTransfer,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
struct FileUrlResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AccountInfoResponse {
    info: AccountInfo,
}

/// Capability contract for the remote cloud service
///
/// All operations the orchestration core needs from put.io. Implementations
/// must be shareable across worker tasks.
#[async_trait]
pub trait PutioClient: Send + Sync {
    /// Fetch account details; used to verify credentials at startup.
    async fn get_account_info(&self) -> Result<AccountInfo>;

    /// List live transfers, scoped to this instance.
    ///
    /// Scoping applies both mechanisms when configured: a transfer is kept
    /// when its `save_parent_id` matches `parent_id` or its source tag
    /// matches `source`.
    async fn list_transfers(
        &self,
        source: Option<&str>,
        parent_id: Option<FileId>,
    ) -> Result<Vec<RemoteTransfer>>;

    /// Fetch a single transfer by id.
    async fn get_transfer(&self, id: TransferId) -> Result<RemoteTransfer>;

    /// Remove a transfer. A remote 404 is treated as success.
    async fn remove_transfer(&self, id: TransferId) -> Result<()>;

    /// Delete a remote file or folder tree. A remote 404 is treated as success.
    async fn delete_file(&self, id: FileId) -> Result<()>;

    /// Create a folder under `parent`.
    async fn create_folder(&self, name: &str, parent: FileId) -> Result<RemoteFile>;

    /// List a node of the remote file tree.
    async fn list_files(&self, parent: FileId) -> Result<FileListing>;

    /// Resolve the direct HTTP download URL for a file.
    async fn get_file_url(&self, id: FileId) -> Result<String>;
}

/// reqwest-backed [`PutioClient`]
///
/// Carries its own API-call timeout; transient failures are retried per the
/// configured [`RetryConfig`] before the caller sees an error.
pub struct HttpPutioClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry: RetryConfig,
}

impl HttpPutioClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be constructed.
    pub fn new(putio: &PutioConfig, retry: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(putio.api_timeout))
            .build()?;
        Ok(Self {
            http,
            base_url: putio.base_url.trim_end_matches('/').to_string(),
            api_key: putio.api_key.clone(),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        with_retry(&self.retry, || {
            let request = self.http.get(&url).bearer_auth(&self.api_key);
            async move {
                let response = request.send().await?;
                parse_response(response).await
            }
        })
        .await
    }

    /// POST a form body and discard the response, treating 404 as success.
    async fn post_form_idempotent(&self, path: &str, form: &[(&str, String)]) -> Result<()> {
        let url = self.url(path);
        with_retry(&self.retry, || {
            let request = self.http.post(&url).bearer_auth(&self.api_key).form(form);
            async move {
                let response = request.send().await?;
                let status = response.status();
                if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
                    return Ok(());
                }
                Err(error_from_response(response).await)
            }
        })
        .await
    }
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    Ok(response.json().await?)
}

async fn error_from_response(response: reqwest::Response) -> Error {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Error::Api(ApiError { status, message })
}

#[async_trait]
impl PutioClient for HttpPutioClient {
    async fn get_account_info(&self) -> Result<AccountInfo> {
        let response: AccountInfoResponse = self.get_json("/account/info").await?;
        Ok(response.info)
    }

    async fn list_transfers(
        &self,
        source: Option<&str>,
        parent_id: Option<FileId>,
    ) -> Result<Vec<RemoteTransfer>> {
        let response: TransfersResponse = self.get_json("/transfers/list").await?;
        Ok(response
            .transfers
            .into_iter()
            .filter(|t| in_scope(t, source, parent_id))
            .collect())
    }

    async fn get_transfer(&self, id: TransferId) -> Result<RemoteTransfer> {
        let response: TransferResponse = self.get_json(&format!("/transfers/{id}")).await?;
        Ok(response.transfer)
    }

    async fn remove_transfer(&self, id: TransferId) -> Result<()> {
        self.post_form_idempotent("/transfers/remove", &[("transfer_ids", id.to_string())])
            .await
    }

    async fn delete_file(&self, id: FileId) -> Result<()> {
        self.post_form_idempotent("/files/delete", &[("file_ids", id.to_string())])
            .await
    }

    async fn create_folder(&self, name: &str, parent: FileId) -> Result<RemoteFile> {
        let url = self.url("/files/create-folder");
        let body = serde_json::json!({ "name": name, "parent_id": parent });
        let response = with_retry(&self.retry, || {
            let request = self.http.post(&url).bearer_auth(&self.api_key).json(&body);
            async move {
                let response = request.send().await?;
                parse_response::<FileResponse>(response).await
            }
        })
        .await?;
        Ok(response.file)
    }

    async fn list_files(&self, parent: FileId) -> Result<FileListing> {
        self.get_json(&format!("/files/list?parent_id={parent}")).await
    }

    async fn get_file_url(&self, id: FileId) -> Result<String> {
        let response: FileUrlResponse = self.get_json(&format!("/files/{id}/url")).await?;
        Ok(response.url)
    }
}

/// Keep a transfer when it matches either configured scoping mechanism.
///
/// The source tag is not always returned by the remote side and older
/// endpoints ignore parent filtering, so neither mechanism alone is
/// sufficient; an unscoped client keeps everything.
fn in_scope(transfer: &RemoteTransfer, source: Option<&str>, parent_id: Option<FileId>) -> bool {
    if source.is_none() && parent_id.is_none() {
        return true;
    }
    let parent_matches = parent_id.is_some() && transfer.save_parent_id == parent_id;
    let source_matches = match (source, transfer.source.as_deref()) {
        (Some(want), Some(got)) => got.eq_ignore_ascii_case(want),
        _ => false,
    };
    parent_matches || source_matches
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod mock {
    //! In-memory [`PutioClient`] for exercising the orchestration core
    //! without the network.

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Fixture builder: a remote transfer with the given tree root.
    pub(crate) fn remote_transfer(
        id: u64,
        name: &str,
        file_id: Option<i64>,
        status: TransferStatus,
    ) -> RemoteTransfer {
        RemoteTransfer {
            id: TransferId(id),
            hash: Some(format!("{id:08x}feedbeef")),
            name: Some(name.to_string()),
            size: Some(1000),
            downloaded: Some(1000),
            estimated_time: None,
            status,
            started_at: None,
            finished_at: None,
            file_id: file_id.map(FileId),
            save_parent_id: None,
            source: None,
            userfile_exists: true,
            error_message: None,
        }
    }

    /// Fixture builder: a remote folder node.
    pub(crate) fn folder(id: i64, name: &str) -> RemoteFile {
        RemoteFile {
            id: FileId(id),
            name: name.to_string(),
            content_type: None,
            file_type: "FOLDER".to_string(),
        }
    }

    /// Fixture builder: a remote video node.
    pub(crate) fn video(id: i64, name: &str) -> RemoteFile {
        RemoteFile {
            id: FileId(id),
            name: name.to_string(),
            content_type: Some("video/mkv".to_string()),
            file_type: "VIDEO".to_string(),
        }
    }

    /// Fixture builder: a remote node of an arbitrary type.
    pub(crate) fn file_of_type(id: i64, name: &str, file_type: &str) -> RemoteFile {
        RemoteFile {
            id: FileId(id),
            name: name.to_string(),
            content_type: None,
            file_type: file_type.to_string(),
        }
    }

    /// In-memory put.io double recording mutations for assertions.
    #[derive(Default)]
    pub(crate) struct MockPutioClient {
        transfers: Mutex<Vec<RemoteTransfer>>,
        trees: Mutex<HashMap<FileId, FileListing>>,
        urls: Mutex<HashMap<FileId, String>>,
        fail_listing: AtomicBool,
        fail_account: AtomicBool,
        pub(crate) removed_transfers: Mutex<Vec<TransferId>>,
        pub(crate) deleted_files: Mutex<Vec<FileId>>,
    }

    impl MockPutioClient {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn add_transfer(&self, transfer: RemoteTransfer) {
            self.transfers.lock().unwrap().push(transfer);
        }

        pub(crate) fn clear_transfers(&self) {
            self.transfers.lock().unwrap().clear();
        }

        pub(crate) fn set_status(&self, id: TransferId, status: TransferStatus) {
            let mut transfers = self.transfers.lock().unwrap();
            if let Some(t) = transfers.iter_mut().find(|t| t.id == id) {
                t.status = status;
            }
        }

        /// Register one level of the remote file tree.
        pub(crate) fn add_tree(&self, parent: RemoteFile, children: Vec<RemoteFile>) {
            self.trees
                .lock()
                .unwrap()
                .insert(parent.id, FileListing { parent, files: children });
        }

        pub(crate) fn add_url(&self, id: FileId, url: &str) {
            self.urls.lock().unwrap().insert(id, url.to_string());
        }

        /// Make the next `list_transfers` call fail with a 503.
        pub(crate) fn fail_next_listing(&self) {
            self.fail_listing.store(true, Ordering::SeqCst);
        }

        /// Make every `get_account_info` call fail with a 401.
        pub(crate) fn fail_account_info(&self) {
            self.fail_account.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl PutioClient for MockPutioClient {
        async fn get_account_info(&self) -> Result<AccountInfo> {
            if self.fail_account.load(Ordering::SeqCst) {
                return Err(Error::Api(ApiError {
                    status: 401,
                    message: "invalid token".to_string(),
                }));
            }
            Ok(AccountInfo {
                username: "tester".to_string(),
            })
        }

        async fn list_transfers(
            &self,
            _source: Option<&str>,
            _parent_id: Option<FileId>,
        ) -> Result<Vec<RemoteTransfer>> {
            if self.fail_listing.swap(false, Ordering::SeqCst) {
                return Err(Error::Api(ApiError {
                    status: 503,
                    message: "listing unavailable".to_string(),
                }));
            }
            Ok(self.transfers.lock().unwrap().clone())
        }

        async fn get_transfer(&self, id: TransferId) -> Result<RemoteTransfer> {
            self.transfers
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == id)
                .cloned()
                .ok_or_else(|| {
                    Error::Api(ApiError {
                        status: 404,
                        message: format!("transfer {id} not found"),
                    })
                })
        }

        async fn remove_transfer(&self, id: TransferId) -> Result<()> {
            self.removed_transfers.lock().unwrap().push(id);
            Ok(())
        }

        async fn delete_file(&self, id: FileId) -> Result<()> {
            self.deleted_files.lock().unwrap().push(id);
            Ok(())
        }

        async fn create_folder(&self, name: &str, parent: FileId) -> Result<RemoteFile> {
            Ok(RemoteFile {
                id: FileId(parent.0 + 10_000),
                name: name.to_string(),
                content_type: None,
                file_type: "FOLDER".to_string(),
            })
        }

        async fn list_files(&self, parent: FileId) -> Result<FileListing> {
            self.trees.lock().unwrap().get(&parent).cloned().ok_or_else(|| {
                Error::Api(ApiError {
                    status: 404,
                    message: format!("file {parent} not found"),
                })
            })
        }

        async fn get_file_url(&self, id: FileId) -> Result<String> {
            self.urls.lock().unwrap().get(&id).cloned().ok_or_else(|| {
                Error::Api(ApiError {
                    status: 404,
                    message: format!("no url for file {id}"),
                })
            })
        }
    }
}
