//! Shared test helpers for creating PutioDownloader instances in tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

use crate::config::{ArrServiceConfig, Config, DownloadConfig, PutioConfig};
use crate::downloader::PutioDownloader;
use crate::putio::mock::MockPutioClient;
use crate::types::TransferEvent;

/// Build a test config rooted at the given download directory.
pub(crate) fn test_config(download_dir: &Path) -> Config {
    Config {
        download: DownloadConfig {
            download_directory: download_dir.to_path_buf(),
            polling_interval: 1,
            orchestration_workers: 2,
            download_workers: 2,
            ..DownloadConfig::default()
        },
        putio: PutioConfig {
            api_key: "token".to_string(),
            ..PutioConfig::default()
        },
        ..Config::default()
    }
}

/// An Arr service entry pointing at a wiremock server.
pub(crate) fn arr_entry(url: &str) -> ArrServiceConfig {
    ArrServiceConfig {
        name: None,
        url: url.to_string(),
        api_key: "apikey".to_string(),
    }
}

/// Helper to create a test PutioDownloader backed by the in-memory put.io mock.
/// Returns the downloader, the mock, and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader(
    configure: impl FnOnce(&mut Config),
) -> (PutioDownloader, Arc<MockPutioClient>, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(&temp_dir.path().join("downloads"));
    configure(&mut config);
    std::fs::create_dir_all(&config.download.download_directory).unwrap();

    let mock = Arc::new(MockPutioClient::new());
    let downloader = PutioDownloader::with_client(config, mock.clone()).unwrap();
    (downloader, mock, temp_dir)
}

/// Receive the next transfer event, panicking after a timeout.
pub(crate) async fn recv_event(downloader: &PutioDownloader) -> TransferEvent {
    let rx = downloader.channels.transfer_rx.clone();
    tokio::time::timeout(Duration::from_secs(5), async move {
        rx.lock().await.recv().await.expect("event channel closed")
    })
    .await
    .expect("timed out waiting for a transfer event")
}

/// Assert the transfer-events channel is currently empty.
pub(crate) async fn assert_no_event(downloader: &PutioDownloader) {
    let mut rx = downloader.channels.transfer_rx.lock().await;
    assert!(rx.try_recv().is_err(), "expected no queued transfer event");
}

/// A history page body recording one imported path.
pub(crate) fn imported_history_body(dropped_path: &Path) -> serde_json::Value {
    serde_json::json!({
        "totalRecords": 1,
        "records": [
            {
                "eventType": "downloadFolderImported",
                "data": { "droppedPath": dropped_path.to_string_lossy() }
            }
        ]
    })
}

/// A history page body with no records at all.
pub(crate) fn empty_history_body() -> serde_json::Value {
    serde_json::json!({ "totalRecords": 0, "records": [] })
}
