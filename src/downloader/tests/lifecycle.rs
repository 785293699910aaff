use std::time::Duration;

use crate::downloader::test_helpers::create_test_downloader;
use crate::error::Error;

// --- start() / shutdown() tests ---

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_spawns_all_service_loops_and_shutdown_stops_them() {
    let (downloader, _mock, _temp_dir) = create_test_downloader(|_| {});

    let handles = downloader.start().await.unwrap();
    // 2 fetch workers + 2 orchestration workers + 1 poller
    assert_eq!(handles.len(), 5);

    downloader.shutdown().await;
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task must exit after cancellation")
            .unwrap();
    }
}

#[tokio::test]
async fn failed_account_verification_is_fatal_and_spawns_nothing() {
    let (downloader, mock, _temp_dir) = create_test_downloader(|_| {});
    mock.fail_account_info();

    let err = downloader.start().await.unwrap_err();
    assert!(matches!(err, Error::AccountVerification(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_is_idempotent() {
    let (downloader, _mock, _temp_dir) = create_test_downloader(|_| {});
    let handles = downloader.start().await.unwrap();

    downloader.shutdown().await;
    downloader.shutdown().await;

    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("task must exit after cancellation")
            .unwrap();
    }
}
