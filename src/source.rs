//! Remote capabilities consumed by the downloader
//!
//! The downloader does not talk to a mail provider itself. Callers plug in an
//! [`AttachmentFetcher`] for attachment bytes and, optionally, a
//! [`MessageSource`] for finding messages.

use crate::error::FetchError;
use crate::types::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fetches raw attachment bytes from the remote mailbox
///
/// Implementations classify failures as [`FetchError::Transient`] (retried
/// with backoff) or [`FetchError::Permanent`] (fails the attachment at once).
#[async_trait]
pub trait AttachmentFetcher: Send + Sync {
    /// Fetch the bytes of one attachment
    async fn fetch_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Searches the remote mailbox for messages with attachments
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Return messages matching `filters`, with attachment metadata populated
    async fn search_messages(&self, filters: &SearchFilters) -> crate::Result<Vec<Message>>;
}

/// Message and attachment selection criteria passed to a [`MessageSource`]
///
/// All criteria are optional; empty lists and `None` bounds match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Only messages from these senders (addresses or domains)
    #[serde(default)]
    pub senders: Vec<String>,
    /// Only attachments with these extensions (without the dot)
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Only messages on or after this date (`YYYY-MM-DD`)
    #[serde(default)]
    pub after: Option<String>,
    /// Only messages before this date (`YYYY-MM-DD`)
    #[serde(default)]
    pub before: Option<String>,
    /// Minimum attachment size in bytes
    #[serde(default)]
    pub min_size: Option<i64>,
    /// Maximum attachment size in bytes
    #[serde(default)]
    pub max_size: Option<i64>,
    /// Subject must contain at least one of these keywords
    #[serde(default)]
    pub subject_include: Vec<String>,
    /// Subject must contain none of these keywords
    #[serde(default)]
    pub subject_exclude: Vec<String>,
}
