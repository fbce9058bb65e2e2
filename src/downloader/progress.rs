//! Progress aggregation for a batch.
//!
//! Workers never touch [`BatchProgress`] directly. They send
//! [`ProgressUpdate`] messages to a single aggregator task, which applies one
//! mutation per message and then publishes a snapshot.

use crate::types::{BatchProgress, DownloadOutcome, Event};
use tokio::sync::{broadcast, mpsc};

/// Buffer size for the worker-to-aggregator channel
pub(super) const PROGRESS_CHANNEL_BUFFER: usize = 256;

/// Caller-supplied observer invoked with every snapshot
pub(super) type ProgressCallback = Box<dyn FnMut(&BatchProgress) + Send>;

/// A single change reported by a worker
#[derive(Debug)]
pub(super) enum ProgressUpdate {
    /// An attachment left `Pending` and is now in flight
    Started {
        /// `message_id/attachment_id`
        key: String,
    },
    /// An attachment reached its terminal outcome
    Finished {
        /// `message_id/attachment_id`
        key: String,
        message_id: String,
        attachment_id: String,
        outcome: DownloadOutcome,
        /// Bytes written for this attachment (0 unless written)
        bytes: u64,
    },
}

/// Parameters for spawning the aggregator task
pub(super) struct ProgressAggregatorParams {
    /// Attachments in the batch
    pub total: usize,
    /// Updates from workers; the task ends when every sender is dropped
    pub updates: mpsc::Receiver<ProgressUpdate>,
    /// Event broadcast sender
    pub event_tx: broadcast::Sender<Event>,
    /// Optional per-snapshot observer
    pub callback: Option<ProgressCallback>,
}

/// Spawn the task that owns the batch's [`BatchProgress`]
///
/// Resolves to the final progress once all workers have hung up.
pub(super) fn spawn_progress_aggregator(
    params: ProgressAggregatorParams,
) -> tokio::task::JoinHandle<BatchProgress> {
    let ProgressAggregatorParams {
        total,
        mut updates,
        event_tx,
        mut callback,
    } = params;

    tokio::spawn(async move {
        let mut aggregator = Aggregator::new(total);

        while let Some(update) = updates.recv().await {
            if let Some(event) = aggregator.apply(update) {
                event_tx.send(event).ok();
            }

            let snapshot = aggregator.progress.clone();
            if let Some(callback) = callback.as_mut() {
                callback(&snapshot);
            }
            event_tx.send(Event::Progress(snapshot)).ok();
        }

        aggregator.progress
    })
}

/// Single-writer progress state
struct Aggregator {
    progress: BatchProgress,
    /// Keys in flight, oldest first
    in_flight: Vec<String>,
}

impl Aggregator {
    fn new(total: usize) -> Self {
        Self {
            progress: BatchProgress::new(total),
            in_flight: Vec::new(),
        }
    }

    /// Apply one update, returning the per-attachment event it implies
    fn apply(&mut self, update: ProgressUpdate) -> Option<Event> {
        match update {
            ProgressUpdate::Started { key } => {
                self.progress.current_item = Some(key.clone());
                self.in_flight.push(key);
                None
            }
            ProgressUpdate::Finished {
                key,
                message_id,
                attachment_id,
                outcome,
                bytes,
            } => {
                self.in_flight.retain(|k| *k != key);
                self.progress.current_item = self.in_flight.last().cloned();

                let event = match outcome {
                    DownloadOutcome::Written(path) => {
                        self.progress.completed += 1;
                        self.progress.bytes_written += bytes;
                        Event::AttachmentWritten {
                            message_id,
                            attachment_id,
                            path,
                            bytes,
                        }
                    }
                    DownloadOutcome::Skipped(reason) => {
                        self.progress.completed += 1;
                        self.progress.skipped += 1;
                        Event::AttachmentSkipped {
                            message_id,
                            attachment_id,
                            reason,
                        }
                    }
                    DownloadOutcome::Failed(error) => {
                        self.progress.failed += 1;
                        Event::AttachmentFailed {
                            message_id,
                            attachment_id,
                            error,
                        }
                    }
                };
                Some(event)
            }
        }
    }
}
