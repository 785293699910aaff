//! # putio-dl
//!
//! Backend library for delegating Arr (Sonarr/Radarr/Whisparr) downloads to
//! the put.io cloud torrent service.
//!
//! The crate implements the download-orchestration engine of a
//! Transmission-to-put.io bridge: a polling producer observes put.io
//! transfers, orchestration workers materialize them into local file
//! downloads through a bounded fetch pool, import watchers wait for the Arr
//! side to confirm the import, and seed watchers clean up both local disk
//! and the remote account once seeding stops.
//!
//! ## Design Philosophy
//!
//! - **Library-first** - No CLI or UI; the embedding application owns the
//!   RPC surface, configuration loading, and logging setup
//! - **Stateless** - All state is in memory; a restart is a full
//!   rediscovery from the put.io transfer listing
//! - **Message passing over shared state** - The transfer lifecycle is
//!   expressed as events on bounded channels, not mutable status fields
//! - **Cooperative cancellation** - A single root token reaches every task;
//!   cancellation drains and exits, it never aborts mid-write
//!
//! ## Quick Start
//!
//! ```no_run
//! use putio_dl::{Config, PutioDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.putio.api_key = "OAUTH_TOKEN".to_string();
//!
//!     let downloader = PutioDownloader::new(config)?;
//!     downloader.start().await?;
//!
//!     // Run until SIGTERM/SIGINT, then shut down gracefully
//!     putio_dl::run_with_shutdown(downloader).await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Arr history client
pub mod arr;
/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// File fetcher
pub mod fetcher;
/// Target planner
pub mod planner;
/// put.io REST client
pub mod putio;
/// Retry logic and circuit breaking
pub mod retry;
/// Seen-transfer bookkeeping
pub mod seen;
/// Background watcher tracking
pub mod tracker;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use arr::ArrClient;
pub use config::{ArrServiceConfig, Config, DownloadConfig, PutioConfig, RetryConfig};
pub use downloader::PutioDownloader;
pub use error::{ApiError, ArrError, Error, FetchError, PlanError, Result};
pub use fetcher::FileFetcher;
pub use planner::TargetPlanner;
pub use putio::{
    AccountInfo, FileListing, HttpPutioClient, PutioClient, RemoteFile, RemoteTransfer,
    TransferStatus,
};
pub use types::{
    DownloadOutcome, DownloadTarget, DownloadTask, FileId, TargetKind, Transfer, TransferEvent,
    TransferId,
};

/// Helper function to run the downloader until a termination signal arrives,
/// then shut it down gracefully.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal
///   registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(downloader: PutioDownloader) {
    wait_for_signal().await;
    downloader.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    // Signal registration may fail in restricted environments; fall back to
    // the plain Ctrl+C listener when it does
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM");
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT");
        }
        (Err(e), Err(_)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
    }
}
