//! Core downloader implementation split into focused submodules.
//!
//! The `AttachmentDownloader` struct and its methods are organized by concern:
//! - [`dispatch`] - Batch setup and the bounded worker pool
//! - [`item`] - Per-attachment state machine (fetch, then write)
//! - [`progress`] - Single-writer progress aggregation and events
//! - [`directories`] - Per-directory serialization of resolve-and-write

mod directories;
mod dispatch;
mod item;
mod progress;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::{AttachmentFetcher, MessageSource, SearchFilters};
use crate::types::{BatchProgress, BatchReport, Event, Message};
use futures::Stream;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

/// Buffer size of the event broadcast channel
const EVENT_CHANNEL_BUFFER: usize = 1000;

/// Downloads email attachments into an organized directory tree
///
/// Cloneable; clones share configuration, event channel and cancellation.
///
/// ```no_run
/// use attachment_dl::{AttachmentDownloader, Config, FetchError};
/// use attachment_dl::source::AttachmentFetcher;
/// use std::sync::Arc;
///
/// struct Mailbox;
///
/// #[async_trait::async_trait]
/// impl AttachmentFetcher for Mailbox {
///     async fn fetch_attachment(&self, _m: &str, _a: &str) -> Result<Vec<u8>, FetchError> {
///         Ok(b"bytes".to_vec())
///     }
/// }
///
/// # async fn example(messages: Vec<attachment_dl::Message>) -> attachment_dl::Result<()> {
/// let downloader = AttachmentDownloader::new(Config::default(), Arc::new(Mailbox))?;
/// let report = downloader.process(messages).await?;
/// println!("{} written, {} failed", report.written_paths().count(), report.progress.failed);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct AttachmentDownloader {
    /// Configuration (wrapped in Arc for sharing across workers)
    pub(crate) config: Arc<Config>,
    /// Remote attachment fetch capability
    pub(crate) fetcher: Arc<dyn AttachmentFetcher>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Parent token for every batch run by this downloader
    pub(crate) cancel_token: CancellationToken,
}

impl AttachmentDownloader {
    /// Create a downloader after validating `config`
    ///
    /// Nothing touches the filesystem until a batch runs.
    pub fn new(config: Config, fetcher: Arc<dyn AttachmentFetcher>) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_BUFFER);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Subscribe to batch events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Stream of progress snapshots, one per attachment start or finish
    ///
    /// Snapshots missed by a slow consumer are dropped rather than buffered.
    pub fn progress_stream(&self) -> impl Stream<Item = BatchProgress> + Send + 'static {
        BroadcastStream::new(self.event_tx.subscribe()).filter_map(|event| match event {
            Ok(Event::Progress(progress)) => Some(progress),
            _ => None,
        })
    }

    /// Stop dispatching new attachments
    ///
    /// In-flight attachments finish their current step; the rest end
    /// `Skipped(Cancelled)`. Later batches are refused with [`Error::ShuttingDown`].
    pub fn cancel(&self) {
        tracing::info!("Cancellation requested");
        self.cancel_token.cancel();
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// The downloader's cancellation token, for wiring into external shutdown
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Download every attachment of `messages`
    ///
    /// Per-attachment failures are recorded in the report and never abort the
    /// batch. Only an unusable base directory or prior cancellation is an error.
    pub async fn process(&self, messages: Vec<Message>) -> Result<BatchReport> {
        self.run_batch(messages, None).await
    }

    /// Like [`process`](Self::process), calling `callback` with every progress snapshot
    pub async fn process_with_progress<F>(
        &self,
        messages: Vec<Message>,
        callback: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(&BatchProgress) + Send + 'static,
    {
        self.run_batch(messages, Some(Box::new(callback))).await
    }

    /// Search `source` with `filters`, then download what it returns
    pub async fn search_and_process(
        &self,
        source: &dyn MessageSource,
        filters: &SearchFilters,
    ) -> Result<BatchReport> {
        if self.cancel_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let messages = source.search_messages(filters).await?;
        let attachments: usize = messages.iter().map(|m| m.attachments.len()).sum();
        tracing::info!(
            messages = messages.len(),
            attachments,
            "Message search complete"
        );

        self.run_batch(messages, None).await
    }
}
