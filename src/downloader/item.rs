//! Per-attachment state machine.
//!
//! Each attachment moves `Pending -> Fetching -> Writing` and ends in a
//! terminal [`DownloadOutcome`]. Retries happen inside `Fetching`, so a
//! successful write is never repeated.

use super::directories::{DirectoryLocks, PlaceRequest, Placement};
use super::progress::ProgressUpdate;
use crate::config::{Config, NamingStrategy};
use crate::error::AttachmentError;
use crate::organize::target_directory;
use crate::retry::fetch_with_retry;
use crate::sanitize::sanitize_filename;
use crate::source::AttachmentFetcher;
use crate::storage::ensure_directory;
use crate::types::{Attachment, AttachmentReport, DownloadOutcome, Message, SkipReason};
use crate::utils::{format_size, split_extension, truncate_display};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Filename width used in log lines
const LOG_NAME_WIDTH: usize = 60;

/// Everything a worker shares with the rest of the batch
pub(super) struct ItemContext {
    pub config: Arc<Config>,
    pub fetcher: Arc<dyn AttachmentFetcher>,
    pub directories: Arc<DirectoryLocks>,
    pub progress_tx: mpsc::Sender<ProgressUpdate>,
    pub cancel_token: CancellationToken,
}

/// One attachment queued for processing
pub(super) struct WorkItem {
    /// Position in the batch, used to restore input order
    pub index: usize,
    pub message: Arc<Message>,
    pub attachment: Attachment,
}

#[derive(Debug)]
enum ItemState {
    Pending,
    Fetching {
        directory: PathBuf,
        candidate: String,
    },
    /// The fetched payload sits in `Attachment::data` until the write takes it
    Writing {
        directory: PathBuf,
        candidate: String,
    },
    Done(DownloadOutcome),
}

impl ItemState {
    fn name(&self) -> &'static str {
        match self {
            ItemState::Pending => "pending",
            ItemState::Fetching { .. } => "fetching",
            ItemState::Writing { .. } => "writing",
            ItemState::Done(_) => "done",
        }
    }
}

/// Drive one attachment to a terminal outcome
///
/// Never fails: every error becomes a [`DownloadOutcome::Failed`].
pub(super) async fn process_item(ctx: &ItemContext, item: WorkItem) -> (usize, AttachmentReport) {
    let WorkItem {
        index,
        message,
        mut attachment,
    } = item;
    let key = format!("{}/{}", message.id, attachment.id);
    let display_name = truncate_display(&attachment.filename, LOG_NAME_WIDTH, "...");

    let mut state = ItemState::Pending;
    let mut bytes_written = 0u64;

    let outcome = loop {
        let from = state.name();
        state = match state {
            ItemState::Pending => {
                if ctx.cancel_token.is_cancelled() {
                    ItemState::Done(DownloadOutcome::Skipped(SkipReason::Cancelled))
                } else {
                    ctx.progress_tx
                        .send(ProgressUpdate::Started { key: key.clone() })
                        .await
                        .ok();
                    prepare(ctx, &message, &attachment).await
                }
            }
            ItemState::Fetching {
                directory,
                candidate,
            } => {
                let fetched = fetch_with_retry(&ctx.config.retry, &ctx.cancel_token, || {
                    ctx.fetcher.fetch_attachment(&message.id, &attachment.id)
                })
                .await;

                match fetched {
                    Ok(data) if data.is_empty() => {
                        ItemState::Done(DownloadOutcome::Skipped(SkipReason::EmptyPayload))
                    }
                    Ok(data) => {
                        attachment.data = Some(data);
                        ItemState::Writing {
                            directory,
                            candidate,
                        }
                    }
                    Err(e) => ItemState::Done(DownloadOutcome::Failed(e.into())),
                }
            }
            ItemState::Writing {
                directory,
                candidate,
            } => {
                let data = attachment.data.take().unwrap_or_default();
                let placed = ctx
                    .directories
                    .place(PlaceRequest {
                        directory,
                        candidate,
                        data,
                        overwrite_existing: ctx.config.download.overwrite_existing,
                    })
                    .await;

                match placed {
                    Ok(Placement::Written { path, bytes }) => {
                        bytes_written = bytes;
                        ItemState::Done(DownloadOutcome::Written(path))
                    }
                    Ok(Placement::AlreadyPresent { path }) => {
                        tracing::debug!(path = %path.display(), "Identical file already on disk");
                        ItemState::Done(DownloadOutcome::Skipped(SkipReason::AlreadyPresent))
                    }
                    Err(e) => ItemState::Done(DownloadOutcome::Failed(e)),
                }
            }
            ItemState::Done(outcome) => break outcome,
        };
        tracing::trace!(item = %key, from, to = state.name(), "Attachment state transition");
    };

    log_outcome(&key, &display_name, &outcome, bytes_written);

    ctx.progress_tx
        .send(ProgressUpdate::Finished {
            key,
            message_id: message.id.clone(),
            attachment_id: attachment.id.clone(),
            outcome: outcome.clone(),
            bytes: bytes_written,
        })
        .await
        .ok();

    let report = AttachmentReport {
        message_id: message.id.clone(),
        attachment_id: attachment.id,
        filename: attachment.filename,
        outcome,
    };
    (index, report)
}

/// Pick the destination directory and candidate name, and create the directory
async fn prepare(ctx: &ItemContext, message: &Message, attachment: &Attachment) -> ItemState {
    let download = &ctx.config.download;
    let safe_name = sanitize_filename(&attachment.filename);
    let directory = target_directory(&download.base_dir, download.organize_by, message, &safe_name);
    let candidate = candidate_name(download.naming_strategy, &safe_name);

    if let Err(e) = ensure_directory(&directory).await {
        tracing::error!(
            directory = %directory.display(),
            error = %e,
            "Failed to create attachment directory"
        );
        return ItemState::Done(DownloadOutcome::Failed(AttachmentError::DirectoryCreation {
            path: directory,
            reason: e.to_string(),
        }));
    }

    ItemState::Fetching {
        directory,
        candidate,
    }
}

/// Initial filename before collision resolution
pub(super) fn candidate_name(strategy: NamingStrategy, safe_name: &str) -> String {
    match strategy {
        NamingStrategy::Original => safe_name.to_string(),
        NamingStrategy::Timestamp => {
            let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
            sanitize_filename(&format!("{stamp}_{safe_name}"))
        }
        NamingStrategy::Uuid => {
            let (_, extension) = split_extension(safe_name);
            sanitize_filename(&format!("{}{extension}", uuid::Uuid::new_v4()))
        }
    }
}

fn log_outcome(key: &str, display_name: &str, outcome: &DownloadOutcome, bytes: u64) {
    match outcome {
        DownloadOutcome::Written(path) => tracing::info!(
            item = key,
            filename = display_name,
            path = %path.display(),
            size = %format_size(i64::try_from(bytes).unwrap_or(i64::MAX)),
            "Attachment written"
        ),
        DownloadOutcome::Skipped(reason) => tracing::info!(
            item = key,
            filename = display_name,
            reason = %reason,
            "Attachment skipped"
        ),
        DownloadOutcome::Failed(AttachmentError::Cancelled) => tracing::warn!(
            item = key,
            filename = display_name,
            "Attachment abandoned on cancellation"
        ),
        DownloadOutcome::Failed(error) => tracing::error!(
            item = key,
            filename = display_name,
            code = error.code(),
            error = %error,
            "Attachment failed"
        ),
    }
}
