//! Filename sanitization
//!
//! Remote attachment names are untrusted: they may contain path separators,
//! shell metacharacters, control bytes, arbitrary Unicode, or Windows device
//! names. [`sanitize_filename`] turns any such input into a short, printable
//! ASCII name that is legal on every mainstream filesystem.

/// Returned whenever sanitization leaves nothing usable
pub const FALLBACK_NAME: &str = "unnamed_file";

/// Maximum length of a sanitized filename, in bytes
pub const MAX_FILENAME_LEN: usize = 200;

/// Maximum length accepted by [`is_valid_filename`]
const MAX_VALID_FILENAME_LEN: usize = 255;

/// Characters that are path separators or reserved on at least one platform
const UNSAFE_CHARS: [char; 9] = ['<', '>', ':', '"', '|', '?', '*', '\\', '/'];

/// Windows device names, compared case-insensitively against the base name
const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Accented Latin letters and their ASCII base letter
static TRANSLITERATION: &[(char, &str)] = &[
    ('à', "a"), ('á', "a"), ('â', "a"), ('ã', "a"), ('ä', "a"), ('å', "a"),
    ('è', "e"), ('é', "e"), ('ê', "e"), ('ë', "e"),
    ('ì', "i"), ('í', "i"), ('î', "i"), ('ï', "i"),
    ('ò', "o"), ('ó', "o"), ('ô', "o"), ('õ', "o"), ('ö', "o"),
    ('ù', "u"), ('ú', "u"), ('û', "u"), ('ü', "u"),
    ('ý', "y"), ('ÿ', "y"),
    ('ñ', "n"), ('ç', "c"),
    ('À', "A"), ('Á', "A"), ('Â', "A"), ('Ã', "A"), ('Ä', "A"), ('Å', "A"),
    ('È', "E"), ('É', "E"), ('Ê', "E"), ('Ë', "E"),
    ('Ì', "I"), ('Í', "I"), ('Î', "I"), ('Ï', "I"),
    ('Ò', "O"), ('Ó', "O"), ('Ô', "O"), ('Õ', "O"), ('Ö', "O"),
    ('Ù', "U"), ('Ú', "U"), ('Û', "U"), ('Ü', "U"),
    ('Ý', "Y"), ('Ÿ', "Y"),
    ('Ñ', "N"), ('Ç', "C"),
];

/// Turn an untrusted remote filename into a filesystem-safe one
///
/// The result is never empty, is pure printable ASCII, is at most
/// [`MAX_FILENAME_LEN`] bytes long, never starts or ends with `.` or a space,
/// and is never a Windows device name. The function is idempotent.
///
/// When the name has to be shortened the extension after the last `.` is kept.
///
/// # Examples
///
/// ```
/// use attachment_dl::sanitize::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Contract <FINAL>.pdf"), "Contract _FINAL_.pdf");
/// assert_eq!(sanitize_filename("résumé.pdf"), "resume.pdf");
/// assert_eq!(sanitize_filename("CON.txt"), "_CON.txt");
/// assert_eq!(sanitize_filename("   "), "unnamed_file");
/// ```
#[must_use]
pub fn sanitize_filename(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let ascii = replace_unsafe_chars(trimmed);
    let collapsed = collapse_underscores(&ascii);
    let stripped = collapsed.trim_matches(|c| c == '_' || c == '.' || c == ' ');
    if stripped.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let truncated = truncate_preserving_extension(stripped);
    let guarded = guard_reserved_name(truncated);

    let finished = guarded.trim_end_matches([' ', '.', '_']);
    if finished.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        finished.to_string()
    }
}

/// Check whether a name is safe to use as-is for a file on disk
///
/// Every name produced by [`sanitize_filename`] passes this check.
#[must_use]
pub fn is_valid_filename(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_VALID_FILENAME_LEN {
        return false;
    }
    if name
        .chars()
        .any(|c| UNSAFE_CHARS.contains(&c) || c.is_control())
    {
        return false;
    }
    if name.starts_with(['.', ' ']) || name.ends_with(['.', ' ']) {
        return false;
    }
    !is_reserved(base_name(name))
}

/// One-for-one replacement of separators, control characters and non-ASCII
/// code points; the output is pure ASCII
fn replace_unsafe_chars(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if UNSAFE_CHARS.contains(&c) || c.is_control() {
            out.push('_');
        } else if c.is_ascii() {
            out.push(c);
        } else {
            out.push_str(transliterate(c));
        }
    }
    out
}

fn transliterate(c: char) -> &'static str {
    TRANSLITERATION
        .iter()
        .find(|(from, _)| *from == c)
        .map_or("_", |(_, to)| to)
}

fn collapse_underscores(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;
    for c in name.chars() {
        if c == '_' {
            if !prev_underscore {
                out.push(c);
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }
    out
}

/// Input is ASCII, so byte offsets are char boundaries
fn truncate_preserving_extension(name: &str) -> String {
    if name.len() <= MAX_FILENAME_LEN {
        return name.to_string();
    }

    if let Some(dot) = name.rfind('.') {
        let extension = &name[dot..];
        if extension.len() < MAX_FILENAME_LEN {
            let available = MAX_FILENAME_LEN - extension.len();
            return format!("{}{}", &name[..available.min(dot)], extension);
        }
    }

    name[..MAX_FILENAME_LEN].to_string()
}

fn guard_reserved_name(name: String) -> String {
    if is_reserved(base_name(&name)) {
        format!("_{name}")
    } else {
        name
    }
}

/// Name without its last extension
fn base_name(name: &str) -> &str {
    name.rfind('.').map_or(name, |dot| &name[..dot])
}

fn is_reserved(base: &str) -> bool {
    RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(base))
}
