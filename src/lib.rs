//! # attachment-dl
//!
//! Library for bulk-downloading email attachments into an organized,
//! collision-free directory tree.
//!
//! ## Design Philosophy
//!
//! attachment-dl is designed to be:
//! - **Safe on disk** - Hostile filenames are sanitized and writes are atomic
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or UI, the mail provider is plugged in through traits
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use attachment_dl::{AttachmentDownloader, Config, FetchError, OrganizeStrategy};
//! use attachment_dl::source::AttachmentFetcher;
//! use std::sync::Arc;
//!
//! struct Mailbox;
//!
//! #[async_trait::async_trait]
//! impl AttachmentFetcher for Mailbox {
//!     async fn fetch_attachment(&self, _message: &str, _attachment: &str) -> Result<Vec<u8>, FetchError> {
//!         Err(FetchError::Transient("not connected".into()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.download.organize_by = OrganizeStrategy::Sender;
//!
//!     let downloader = AttachmentDownloader::new(config, Arc::new(Mailbox))?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     tokio::spawn(attachment_dl::cancel_on_shutdown_signal(downloader.cancel_token()));
//!
//!     let report = downloader.process(Vec::new()).await?;
//!     println!("{} failed", report.progress.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Core downloader implementation (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Destination directory selection
pub mod organize;
/// Retry logic with exponential backoff
pub mod retry;
/// Filename sanitization
pub mod sanitize;
/// Mailbox capabilities plugged in by the caller
pub mod source;
/// Atomic file writes and directory creation
pub mod storage;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, NamingStrategy, OrganizeStrategy, RetryConfig};
pub use downloader::AttachmentDownloader;
pub use error::{AttachmentError, Error, FetchError, Result};
pub use organize::organize_path;
pub use sanitize::sanitize_filename;
pub use source::{AttachmentFetcher, MessageSource, SearchFilters};
pub use types::{
    Attachment, AttachmentReport, BatchProgress, BatchReport, DownloadOutcome, Event, Message,
    SkipReason,
};
pub use utils::{format_size, resolve_unique_name};

/// Cancel `token` when the process receives a termination signal.
///
/// Pass [`AttachmentDownloader::cancel_token`] to stop dispatching new
/// attachments on shutdown while letting in-flight writes finish.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// # use attachment_dl::AttachmentDownloader;
/// # fn example(downloader: &AttachmentDownloader) {
/// tokio::spawn(attachment_dl::cancel_on_shutdown_signal(downloader.cancel_token()));
/// # }
/// ```
pub async fn cancel_on_shutdown_signal(token: tokio_util::sync::CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("Shutdown signal received, cancelling downloads");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
