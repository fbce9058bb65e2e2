//! Shared test helpers: scripted fetchers, message builders and downloader setup.

use crate::config::{Config, OrganizeStrategy};
use crate::downloader::AttachmentDownloader;
use crate::error::FetchError;
use crate::source::AttachmentFetcher;
use crate::types::{Attachment, Message};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Side effect run while an attachment is being fetched
type FetchHook = Box<dyn Fn() + Send + Sync>;

/// Fetcher with scripted per-attachment responses and concurrency instrumentation
///
/// Unscripted attachments return `content of <attachment_id>`.
#[derive(Default)]
pub(crate) struct MockFetcher {
    hooks: HashMap<String, FetchHook>,
    payloads: HashMap<String, Vec<u8>>,
    always_fail: HashMap<String, FetchError>,
    fail_first: Mutex<HashMap<String, VecDeque<FetchError>>>,
    delay: Duration,
    calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockFetcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_payload(mut self, attachment_id: &str, data: &[u8]) -> Self {
        self.payloads.insert(attachment_id.to_string(), data.to_vec());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `hook` during every fetch of `attachment_id`, before it returns
    pub(crate) fn on_fetch(
        mut self,
        attachment_id: &str,
        hook: impl Fn() + Send + Sync + 'static,
    ) -> Self {
        self.hooks.insert(attachment_id.to_string(), Box::new(hook));
        self
    }

    pub(crate) fn failing_always(mut self, attachment_id: &str, error: FetchError) -> Self {
        self.always_fail.insert(attachment_id.to_string(), error);
        self
    }

    /// Fail the first `times` fetches of `attachment_id`, then succeed
    pub(crate) fn failing_times(self, attachment_id: &str, times: usize, error: FetchError) -> Self {
        self.fail_first
            .lock()
            .unwrap()
            .insert(attachment_id.to_string(), std::iter::repeat_n(error, times).collect());
        self
    }

    pub(crate) fn calls_for(&self, attachment_id: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(attachment_id)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of fetches observed running at the same time
    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn respond(&self, attachment_id: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(err) = self.always_fail.get(attachment_id) {
            return Err(err.clone());
        }
        if let Some(err) = self
            .fail_first
            .lock()
            .unwrap()
            .get_mut(attachment_id)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(self
            .payloads
            .get(attachment_id)
            .cloned()
            .unwrap_or_else(|| format!("content of {attachment_id}").into_bytes()))
    }
}

#[async_trait]
impl AttachmentFetcher for MockFetcher {
    async fn fetch_attachment(
        &self,
        _message_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, FetchError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(attachment_id.to_string())
            .or_default() += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(hook) = self.hooks.get(attachment_id) {
            hook();
        }
        let result = self.respond(attachment_id);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Message with one attachment per `(attachment_id, filename)` pair
pub(crate) fn message(id: &str, sender: &str, attachments: &[(&str, &str)]) -> Message {
    Message {
        id: id.to_string(),
        thread_id: format!("thread-{id}"),
        subject: format!("Subject {id}"),
        sender: sender.to_string(),
        date: "2024-03-15".to_string(),
        attachments: attachments
            .iter()
            .map(|(attachment_id, filename)| Attachment {
                id: attachment_id.to_string(),
                filename: filename.to_string(),
                mime_type: "application/octet-stream".to_string(),
                size: 0,
                data: None,
            })
            .collect(),
    }
}

/// Flat layout under `<temp>/downloads` with fast, jitter-free retries
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.base_dir = temp_dir.path().join("downloads");
    config.download.organize_by = OrganizeStrategy::Flat;
    config.download.max_concurrent_downloads = 3;
    config.retry.max_retries = 2;
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(20);
    config.retry.jitter = false;
    config
}

/// Downloader over `fetcher` with [`test_config`], adjusted by `configure`
///
/// Returns the tempdir, which must be kept alive.
pub(crate) fn create_test_downloader(
    fetcher: Arc<MockFetcher>,
    configure: impl FnOnce(&mut Config),
) -> (AttachmentDownloader, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = test_config(&temp_dir);
    configure(&mut config);
    let downloader = AttachmentDownloader::new(config, fetcher).unwrap();
    (downloader, temp_dir)
}
