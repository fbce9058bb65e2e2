use super::test_helpers::*;
use super::*;
use crate::config::{NamingStrategy, OrganizeStrategy};
use crate::error::{AttachmentError, FetchError};
use crate::types::{DownloadOutcome, SkipReason};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod concurrency;

/// The written path of an outcome, panicking otherwise
fn written_path(outcome: &DownloadOutcome) -> PathBuf {
    match outcome {
        DownloadOutcome::Written(path) => path.clone(),
        other => panic!("expected Written, got {other:?}"),
    }
}
