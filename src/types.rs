//! Core types for attachment-dl

use crate::error::AttachmentError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// An email message and its attachment metadata, as returned by a message source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Remote message identifier
    pub id: String,
    /// Remote thread identifier
    #[serde(default)]
    pub thread_id: String,
    /// Subject line
    #[serde(default)]
    pub subject: String,
    /// Sender, either a bare address or `Name <address>`
    #[serde(default)]
    pub sender: String,
    /// Date as an opaque sortable string (e.g. `2024-03-15`)
    #[serde(default)]
    pub date: String,
    /// Attachments in the order the message lists them
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// Attachment metadata, plus the payload once it has been fetched
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Remote attachment identifier
    pub id: String,
    /// Remote filename; untrusted and never used on disk without sanitizing
    pub filename: String,
    /// Declared MIME type
    #[serde(default)]
    pub mime_type: String,
    /// Declared size in bytes
    #[serde(default)]
    pub size: i64,
    /// Payload, set by the downloader after a successful fetch and taken by the write
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
}

impl Attachment {
    /// Lowercase extension of the remote filename, without the dot
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = crate::utils::split_extension(&self.filename);
        ext.strip_prefix('.')
            .filter(|e| !e.is_empty())
            .map(str::to_lowercase)
    }
}

/// Why an attachment was not written
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The fetch returned zero bytes
    EmptyPayload,
    /// A file with identical content already exists at the organized path
    AlreadyPresent,
    /// The batch was cancelled before this attachment was dispatched
    Cancelled,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SkipReason::EmptyPayload => "empty payload",
            SkipReason::AlreadyPresent => "already present",
            SkipReason::Cancelled => "cancelled",
        };
        f.write_str(text)
    }
}

/// Terminal result for one attachment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum DownloadOutcome {
    /// Written to this path
    Written(PathBuf),
    /// Deliberately not written
    Skipped(SkipReason),
    /// Failed; the error is local to this attachment
    Failed(AttachmentError),
}

impl DownloadOutcome {
    /// Returns true for [`DownloadOutcome::Written`]
    pub fn is_written(&self) -> bool {
        matches!(self, DownloadOutcome::Written(_))
    }

    /// Returns true for [`DownloadOutcome::Skipped`]
    pub fn is_skipped(&self) -> bool {
        matches!(self, DownloadOutcome::Skipped(_))
    }

    /// Returns true for [`DownloadOutcome::Failed`]
    pub fn is_failed(&self) -> bool {
        matches!(self, DownloadOutcome::Failed(_))
    }

    /// The written path, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            DownloadOutcome::Written(path) => Some(path),
            _ => None,
        }
    }
}

/// Outcome of one attachment, tagged with where it came from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentReport {
    /// Owning message identifier
    pub message_id: String,
    /// Attachment identifier
    pub attachment_id: String,
    /// Remote filename as received
    pub filename: String,
    /// Terminal outcome
    pub outcome: DownloadOutcome,
}

/// Aggregate progress of a batch
///
/// Only the coordinator's aggregator mutates this; observers get snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    /// Attachments in the batch
    pub total: usize,
    /// Attachments that ended written or skipped
    pub completed: usize,
    /// Attachments that ended failed
    pub failed: usize,
    /// Subset of `completed` that was skipped
    pub skipped: usize,
    /// Bytes written to disk so far
    pub bytes_written: u64,
    /// Attachment currently in flight (`message_id/attachment_id`)
    pub current_item: Option<String>,
}

impl BatchProgress {
    /// New progress for a batch of `total` attachments
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Attachments that reached a terminal outcome
    pub fn finished(&self) -> usize {
        self.completed + self.failed
    }

    /// Whether every attachment reached a terminal outcome
    pub fn is_done(&self) -> bool {
        self.finished() >= self.total
    }

    /// Progress percentage (0.0 to 100.0); an empty batch counts as done
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            return 100.0;
        }
        (self.finished() as f32 / self.total as f32) * 100.0
    }
}

/// Final result of a batch: the progress totals plus one report per attachment
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    /// Final progress snapshot
    pub progress: BatchProgress,
    /// Per-attachment outcomes in input order
    pub outcomes: Vec<AttachmentReport>,
}

impl BatchReport {
    /// Paths of all written attachments
    pub fn written_paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes.iter().filter_map(|r| r.outcome.path())
    }

    /// Reports of failed attachments
    pub fn failures(&self) -> impl Iterator<Item = &AttachmentReport> {
        self.outcomes.iter().filter(|r| r.outcome.is_failed())
    }
}

/// Event emitted during a batch
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A batch was accepted and is about to dispatch work
    BatchStarted {
        /// Attachments in the batch
        total: usize,
    },

    /// Progress snapshot after an attachment started or finished
    Progress(BatchProgress),

    /// Attachment written to disk
    AttachmentWritten {
        /// Owning message identifier
        message_id: String,
        /// Attachment identifier
        attachment_id: String,
        /// Final path on disk
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },

    /// Attachment skipped
    AttachmentSkipped {
        /// Owning message identifier
        message_id: String,
        /// Attachment identifier
        attachment_id: String,
        /// Why it was skipped
        reason: SkipReason,
    },

    /// Attachment failed
    AttachmentFailed {
        /// Owning message identifier
        message_id: String,
        /// Attachment identifier
        attachment_id: String,
        /// The per-attachment error
        error: AttachmentError,
    },

    /// Every attachment reached a terminal outcome
    BatchComplete(BatchProgress),
}
