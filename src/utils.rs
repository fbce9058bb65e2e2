//! Utility functions for sizes, collision-free names and log display

use std::path::Path;

/// Maximum number of `_N` suffixes probed before falling back to a timestamp
pub const MAX_RENAME_ATTEMPTS: u32 = 1000;

/// Returned by [`format_size`] for negative byte counts
pub const INVALID_SIZE: &str = "Invalid size";

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Format a byte count for display
///
/// Values are scaled by 1024 through `B, KB, MB, GB, TB, PB`. Scaled values
/// below 10 get two decimals, below 100 one decimal, and larger values none,
/// so the width stays roughly constant across units.
///
/// # Examples
///
/// ```
/// use attachment_dl::utils::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1023), "1023 B");
/// assert_eq!(format_size(1024), "1.00 KB");
/// assert_eq!(format_size(52_428_800), "50.0 MB");
/// assert_eq!(format_size(-1), "Invalid size");
/// ```
#[must_use]
pub fn format_size(bytes: i64) -> String {
    if bytes < 0 {
        return INVALID_SIZE.to_string();
    }
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let suffix = SIZE_UNITS[unit];
    if value >= 100.0 {
        format!("{value:.0} {suffix}")
    } else if value >= 10.0 {
        format!("{value:.1} {suffix}")
    } else {
        format!("{value:.2} {suffix}")
    }
}

/// Find a filename that does not yet exist in `directory`
///
/// Returns `filename` unchanged when it is free. Otherwise probes
/// `base_1.ext`, `base_2.ext`, ... up to [`MAX_RENAME_ATTEMPTS`] and returns
/// the first free one. If every probe is taken the base gets a nanosecond
/// timestamp suffix instead. Empty input is returned unchanged.
///
/// This is a check against the live filesystem and is only race-free when
/// callers serialize resolve-and-write per directory.
///
/// # Examples
///
/// ```no_run
/// use attachment_dl::utils::resolve_unique_name;
/// use std::path::Path;
///
/// // If /tmp/inbox/a.txt exists, returns "a_1.txt"
/// let name = resolve_unique_name(Path::new("/tmp/inbox"), "a.txt");
/// ```
#[must_use]
pub fn resolve_unique_name(directory: &Path, filename: &str) -> String {
    if directory.as_os_str().is_empty() || filename.is_empty() {
        return filename.to_string();
    }
    if !is_taken(&directory.join(filename)) {
        return filename.to_string();
    }

    let (stem, extension) = split_extension(filename);

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = format!("{stem}_{i}{extension}");
        if !is_taken(&directory.join(&candidate)) {
            return candidate;
        }
    }

    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    tracing::warn!(
        directory = %directory.display(),
        filename,
        attempts = MAX_RENAME_ATTEMPTS,
        "Collision probes exhausted, using timestamp suffix"
    );
    format!("{stem}_{nanos}{extension}")
}

/// Split `name` into stem and extension (extension keeps its leading dot)
///
/// A leading dot does not start an extension.
pub(crate) fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    }
}

/// A dangling symlink still occupies the name
fn is_taken(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok()
}

/// Shorten text for display, preferring to cut at a word boundary
///
/// `max_len` counts characters and includes `suffix`. A space in the last
/// 20% of the room left for text is used as the cut point when present.
///
/// # Examples
///
/// ```
/// use attachment_dl::utils::truncate_display;
///
/// assert_eq!(truncate_display("Quarterly report", 50, "..."), "Quarterly report");
/// assert_eq!(truncate_display("Quarterly financial report", 23, "..."), "Quarterly financial...");
/// ```
#[must_use]
pub fn truncate_display(text: &str, max_len: usize, suffix: &str) -> String {
    if text.is_empty() || max_len == 0 {
        return String::new();
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }

    let suffix_len = suffix.chars().count();
    if suffix_len >= max_len {
        return suffix.chars().take(max_len).collect();
    }

    let available = max_len - suffix_len;
    let search_start = available * 4 / 5;
    let cut = (search_start..available)
        .rev()
        .find(|&i| i > 0 && chars[i] == ' ')
        .unwrap_or(available);

    let kept: String = chars[..cut].iter().collect();
    format!("{}{suffix}", kept.trim_end_matches(' '))
}
