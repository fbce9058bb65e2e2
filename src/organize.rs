//! Destination path organization
//!
//! Maps a message's metadata and a sanitized filename to a path under the
//! base download directory. Every directory component derived from remote
//! metadata is sanitized the same way filenames are.

use crate::config::OrganizeStrategy;
use crate::sanitize::sanitize_filename;
use crate::types::Message;
use crate::utils::split_extension;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const MIN_EMAIL_LEN: usize = 5;
const MAX_EMAIL_LEN: usize = 254;

static EMAIL_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok());

/// Directory an attachment belongs in, without the filename
///
/// ```
/// use attachment_dl::organize::target_directory;
/// use attachment_dl::config::OrganizeStrategy;
/// use attachment_dl::types::Message;
/// use std::path::Path;
///
/// let message = Message {
///     sender: "Alice Smith <Alice@Example.com>".into(),
///     ..Default::default()
/// };
/// let dir = target_directory(Path::new("/dl"), OrganizeStrategy::Sender, &message, "a.pdf");
/// assert_eq!(dir, Path::new("/dl/alice@example.com"));
/// ```
#[must_use]
pub fn target_directory(
    base_dir: &Path,
    strategy: OrganizeStrategy,
    message: &Message,
    safe_filename: &str,
) -> PathBuf {
    match strategy {
        OrganizeStrategy::Sender => {
            let sender = extract_email_address(&message.sender)
                .unwrap_or_else(|| message.sender.clone());
            base_dir.join(sanitize_filename(&sender))
        }
        OrganizeStrategy::Date => base_dir.join(sanitize_filename(&message.date)),
        OrganizeStrategy::Type => {
            let (_, ext) = split_extension(safe_filename);
            match ext.strip_prefix('.').filter(|e| !e.is_empty()) {
                Some(ext) => base_dir.join(sanitize_filename(&ext.to_lowercase())),
                None => base_dir.to_path_buf(),
            }
        }
        OrganizeStrategy::Flat => base_dir.to_path_buf(),
    }
}

/// Full organized path for an attachment
///
/// `safe_filename` must already be sanitized. This does not touch the
/// filesystem; directory creation and collision handling happen at write time.
#[must_use]
pub fn organize_path(
    base_dir: &Path,
    strategy: OrganizeStrategy,
    message: &Message,
    safe_filename: &str,
) -> PathBuf {
    target_directory(base_dir, strategy, message, safe_filename).join(safe_filename)
}

/// Extract a normalized email address from a sender field
///
/// Accepts `Name <addr>` and bare addresses. Returns the lowercased address,
/// or `None` if it does not look like an email address.
#[must_use]
pub fn extract_email_address(sender: &str) -> Option<String> {
    let sender = sender.trim();
    let candidate = match (sender.rfind('<'), sender.rfind('>')) {
        (Some(open), Some(close)) if open < close => &sender[open + 1..close],
        _ => sender,
    };

    let address = candidate.trim().to_lowercase();
    is_valid_email(&address).then_some(address)
}

/// Whether `address` is a plausible email address
#[must_use]
pub fn is_valid_email(address: &str) -> bool {
    if !(MIN_EMAIL_LEN..=MAX_EMAIL_LEN).contains(&address.len()) {
        return false;
    }
    EMAIL_RE.as_ref().is_some_and(|re| re.is_match(address))
}
