//! Per-directory serialization of name resolution and writes.
//!
//! Checking for a free name and then creating it is racy when two workers
//! target the same directory. Every resolve-and-write for a directory runs
//! under that directory's lock, and the final rename refuses to clobber, so
//! two attachments can never both land on the same path.

use crate::error::AttachmentError;
use crate::sanitize::is_valid_filename;
use crate::storage::{has_identical_content, write_file_atomically_with};
use crate::utils::resolve_unique_name;
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Rounds of resolve-then-write before giving up on a directory that keeps
/// gaining files from outside the batch
const MAX_PLACEMENT_ATTEMPTS: u32 = 3;

/// Names this batch has written in one directory
#[derive(Debug, Default)]
pub(super) struct DirectoryState {
    claimed: HashSet<String>,
}

/// Registry of per-directory locks, shared by all workers of a batch
#[derive(Debug, Default)]
pub(super) struct DirectoryLocks {
    dirs: Mutex<HashMap<PathBuf, Arc<Mutex<DirectoryState>>>>,
}

/// What a write request should do
pub(super) struct PlaceRequest {
    pub directory: PathBuf,
    pub candidate: String,
    pub data: Vec<u8>,
    pub overwrite_existing: bool,
}

/// Where the payload ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Placement {
    /// Payload written to `path`
    Written { path: PathBuf, bytes: u64 },
    /// Identical content already sits at `path`
    AlreadyPresent { path: PathBuf },
}

impl DirectoryLocks {
    async fn state_for(&self, directory: &Path) -> Arc<Mutex<DirectoryState>> {
        let mut dirs = self.dirs.lock().await;
        Arc::clone(dirs.entry(directory.to_path_buf()).or_default())
    }

    /// Resolve a free name in the request's directory and write the payload there
    pub(super) async fn place(&self, request: PlaceRequest) -> Result<Placement, AttachmentError> {
        let state = self.state_for(&request.directory).await;
        let guard = state.lock_owned().await;

        let fallback_path = request.directory.join(&request.candidate);
        tokio::task::spawn_blocking(move || {
            let mut guard = guard;
            place_blocking(&request, &mut guard.claimed)
        })
        .await
        .unwrap_or_else(|e| {
            Err(AttachmentError::Write {
                path: fallback_path,
                reason: format!("write task panicked: {e}"),
            })
        })
    }
}

fn place_blocking(
    request: &PlaceRequest,
    claimed: &mut HashSet<String>,
) -> Result<Placement, AttachmentError> {
    let PlaceRequest {
        directory,
        candidate,
        data,
        overwrite_existing,
    } = request;

    let target = directory.join(candidate);
    let existing_file = std::fs::symlink_metadata(&target)
        .map(|meta| meta.is_file())
        .unwrap_or(false);

    if existing_file {
        if *overwrite_existing && !claimed.contains(candidate) {
            tracing::debug!(path = %target.display(), "Replacing file that predates this batch");
            write_payload(&target, data, true)?;
            claimed.insert(candidate.clone());
            return Ok(Placement::Written {
                path: target,
                bytes: data.len() as u64,
            });
        }
        if has_identical_content(&target, data).unwrap_or(false) {
            return Ok(Placement::AlreadyPresent { path: target });
        }
    }

    for attempt in 1..=MAX_PLACEMENT_ATTEMPTS {
        let name = resolve_unique_name(directory, candidate);
        let path = directory.join(&name);

        if !is_valid_filename(&name) {
            return Err(AttachmentError::Write {
                path,
                reason: "refusing to write an unsafe filename".to_string(),
            });
        }

        match write_file_atomically_with(&path, false, |file| file.write_all(data)) {
            Ok(()) => {
                claimed.insert(name);
                return Ok(Placement::Written {
                    path,
                    bytes: data.len() as u64,
                });
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(
                    path = %path.display(),
                    attempt,
                    "Name taken between probe and write, resolving again"
                );
            }
            Err(e) => return Err(write_error(&path, &e)),
        }
    }

    Err(AttachmentError::NameCollisionExhausted {
        directory: directory.clone(),
        filename: candidate.clone(),
    })
}

fn write_payload(path: &Path, data: &[u8], overwrite: bool) -> Result<(), AttachmentError> {
    write_file_atomically_with(path, overwrite, |file| file.write_all(data))
        .map_err(|e| write_error(path, &e))
}

fn write_error(path: &Path, err: &io::Error) -> AttachmentError {
    AttachmentError::Write {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
