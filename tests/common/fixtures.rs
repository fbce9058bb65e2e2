//! In-memory mailbox and message fixtures

use async_trait::async_trait;
use attachment_dl::{
    Attachment, AttachmentFetcher, Config, FetchError, Message, MessageSource, OrganizeStrategy,
    SearchFilters,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// A mailbox held entirely in memory
///
/// Serves as both the [`MessageSource`] and the [`AttachmentFetcher`].
/// Attachments with no stored bytes fail permanently, like a deleted upload.
#[derive(Default)]
pub struct InMemoryMailbox {
    messages: Vec<Message>,
    contents: HashMap<(String, String), Vec<u8>>,
    flaky: Mutex<HashMap<String, u32>>,
}

impl InMemoryMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message whose attachments carry `(filename, bytes)`
    pub fn with_message(mut self, id: &str, sender: &str, date: &str, files: &[(&str, &[u8])]) -> Self {
        let attachments = files
            .iter()
            .enumerate()
            .map(|(i, (filename, bytes))| {
                let attachment_id = format!("{id}-att{i}");
                self.contents
                    .insert((id.to_string(), attachment_id.clone()), bytes.to_vec());
                Attachment {
                    id: attachment_id,
                    filename: filename.to_string(),
                    mime_type: "application/octet-stream".to_string(),
                    size: bytes.len() as i64,
                    data: None,
                }
            })
            .collect();

        self.messages.push(Message {
            id: id.to_string(),
            thread_id: format!("thread-{id}"),
            subject: format!("Attachments from {sender}"),
            sender: sender.to_string(),
            date: date.to_string(),
            attachments,
        });
        self
    }

    /// Reference an attachment that the server no longer has
    pub fn with_missing_attachment(mut self, message_id: &str, filename: &str) -> Self {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.attachments.push(Attachment {
                id: format!("{message_id}-missing"),
                filename: filename.to_string(),
                mime_type: "application/octet-stream".to_string(),
                size: 0,
                data: None,
            });
        }
        self
    }

    /// Fail the first `times` fetches of `attachment_id` with a transient error
    pub fn with_flaky(self, attachment_id: &str, times: u32) -> Self {
        self.flaky
            .lock()
            .unwrap()
            .insert(attachment_id.to_string(), times);
        self
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.clone()
    }
}

#[async_trait]
impl AttachmentFetcher for InMemoryMailbox {
    async fn fetch_attachment(
        &self,
        message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, FetchError> {
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(attachment_id)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(FetchError::Transient("429 too many requests".into()));
            }
        }

        self.contents
            .get(&(message_id.to_string(), attachment_id.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::Permanent(format!("attachment {attachment_id} not found")))
    }
}

#[async_trait]
impl MessageSource for InMemoryMailbox {
    async fn search_messages(&self, filters: &SearchFilters) -> attachment_dl::Result<Vec<Message>> {
        let senders: Vec<String> = filters.senders.iter().map(|s| s.to_lowercase()).collect();
        Ok(self
            .messages
            .iter()
            .filter(|m| {
                senders.is_empty() || senders.iter().any(|s| m.sender.to_lowercase().contains(s))
            })
            .cloned()
            .collect())
    }
}

/// Config rooted at `<dir>/downloads` with fast retries
pub fn test_config(dir: &Path, organize_by: OrganizeStrategy) -> Config {
    let mut config = Config::default();
    config.download.base_dir = dir.join("downloads");
    config.download.organize_by = organize_by;
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(20);
    config.retry.jitter = false;
    config
}
