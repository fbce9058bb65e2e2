//! Batch dispatch: the bounded worker pool.

use super::AttachmentDownloader;
use super::directories::DirectoryLocks;
use super::item::{ItemContext, WorkItem, process_item};
use super::progress::{
    PROGRESS_CHANNEL_BUFFER, ProgressAggregatorParams, ProgressCallback, spawn_progress_aggregator,
};
use crate::error::{Error, Result};
use crate::storage::ensure_directory;
use crate::types::{AttachmentReport, BatchReport, Event, Message};
use crate::utils::format_size;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

impl AttachmentDownloader {
    /// Run one batch through the worker pool
    pub(super) async fn run_batch(
        &self,
        messages: Vec<Message>,
        callback: Option<ProgressCallback>,
    ) -> Result<BatchReport> {
        if self.cancel_token.is_cancelled() {
            return Err(Error::ShuttingDown);
        }

        let download = &self.config.download;
        ensure_directory(&download.base_dir).await.map_err(|e| {
            tracing::error!(
                base_dir = %download.base_dir.display(),
                error = %e,
                "Base download directory unavailable"
            );
            Error::DirectoryCreation {
                path: download.base_dir.clone(),
                reason: e.to_string(),
            }
        })?;

        let items = flatten(messages);
        let total = items.len();
        let concurrency = download.max_concurrent_downloads.max(1);

        let batch_token = self.cancel_token.child_token();
        let deadline = download
            .batch_timeout
            .map(|timeout| spawn_deadline(timeout, batch_token.clone()));

        let (progress_tx, progress_rx) = tokio::sync::mpsc::channel(PROGRESS_CHANNEL_BUFFER);
        let aggregator = spawn_progress_aggregator(ProgressAggregatorParams {
            total,
            updates: progress_rx,
            event_tx: self.event_tx.clone(),
            callback,
        });

        tracing::info!(
            attachments = total,
            concurrency,
            organize_by = %download.organize_by,
            naming_strategy = %download.naming_strategy,
            "Batch started"
        );
        self.event_tx.send(Event::BatchStarted { total }).ok();

        let ctx = ItemContext {
            config: Arc::clone(&self.config),
            fetcher: Arc::clone(&self.fetcher),
            directories: Arc::new(DirectoryLocks::default()),
            progress_tx,
            cancel_token: batch_token.clone(),
        };

        let mut reports: Vec<(usize, AttachmentReport)> = stream::iter(items)
            .map(|item| process_item(&ctx, item))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        reports.sort_by_key(|(index, _)| *index);

        // Closing the last sender lets the aggregator finish
        drop(ctx);
        if let Some(deadline) = deadline {
            deadline.abort();
        }

        let progress = aggregator.await.map_err(|e| {
            tracing::error!(error = %e, "Progress aggregator panicked");
            Error::Io(std::io::Error::other(format!("progress aggregator panicked: {e}")))
        })?;

        if batch_token.is_cancelled() {
            tracing::warn!(
                completed = progress.completed,
                failed = progress.failed,
                total,
                "Batch cancelled before all attachments were dispatched"
            );
        }
        tracing::info!(
            written = progress.completed - progress.skipped,
            skipped = progress.skipped,
            failed = progress.failed,
            bytes = %format_size(i64::try_from(progress.bytes_written).unwrap_or(i64::MAX)),
            "Batch complete"
        );
        self.event_tx.send(Event::BatchComplete(progress.clone())).ok();

        Ok(BatchReport {
            progress,
            outcomes: reports.into_iter().map(|(_, report)| report).collect(),
        })
    }
}

/// One work item per attachment, in message order then attachment order
fn flatten(messages: Vec<Message>) -> Vec<WorkItem> {
    let mut items = Vec::new();
    for mut message in messages {
        let attachments = std::mem::take(&mut message.attachments);
        let message = Arc::new(message);
        for attachment in attachments {
            items.push(WorkItem {
                index: items.len(),
                message: Arc::clone(&message),
                attachment,
            });
        }
    }
    items
}

/// Cancel `token` once `timeout` elapses
fn spawn_deadline(timeout: Duration, token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(timeout_secs = timeout.as_secs(), "Batch deadline reached, stopping dispatch");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    })
}
