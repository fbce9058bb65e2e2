//! Filesystem primitives: directory creation and atomic writes
//!
//! Writes go to a hidden temporary file in the destination directory, are
//! flushed to disk, and are then renamed onto the final name. A failed or
//! interrupted write never leaves anything under the final name.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

const TEMP_PREFIX: &str = ".attachment-dl-";
const TEMP_SUFFIX: &str = ".part";

/// Create `path` and any missing parents
///
/// Safe to call concurrently for the same path. Fails if `path` is empty or
/// exists but is not a directory.
pub async fn ensure_directory(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "directory path is empty",
        ));
    }

    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} exists but is not a directory", path.display()),
            ));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    tokio::fs::create_dir_all(path).await?;

    // A concurrent caller may have raced a file into place
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists but is not a directory", path.display()),
        ));
    }
    Ok(())
}

/// Write `data` to `path` so that the final name only ever holds complete content
///
/// With `overwrite` false the rename fails with [`io::ErrorKind::AlreadyExists`]
/// if something appeared at `path` in the meantime.
pub async fn write_file_atomically(path: &Path, data: Vec<u8>, overwrite: bool) -> io::Result<()> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        write_file_atomically_with(&path, overwrite, |file| file.write_all(&data))
    })
    .await
    .map_err(|e| io::Error::other(format!("write task panicked: {e}")))?
}

/// Blocking atomic write driven by a caller-supplied writer
///
/// `writer` fills the temporary file. If it fails, or anything after it
/// fails, the temporary file is removed and the final name is untouched.
pub fn write_file_atomically_with<F>(path: &Path, overwrite: bool, writer: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )
    })?;

    let mut temp = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(TEMP_SUFFIX)
        .tempfile_in(parent)?;

    writer(temp.as_file_mut())?;
    temp.as_file_mut().flush()?;
    temp.as_file().sync_all()?;

    let persisted = if overwrite {
        temp.persist(path)
    } else {
        temp.persist_noclobber(path)
    };
    persisted.map_err(|e| e.error)?;
    Ok(())
}

/// SHA-256 of a byte slice
pub fn content_digest(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Whether the regular file at `path` holds exactly `data`
///
/// Sizes are compared first so differing files are rarely hashed.
pub fn has_identical_content(path: &Path, data: &[u8]) -> io::Result<bool> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() || meta.len() != data.len() as u64 {
        return Ok(false);
    }

    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    let on_disk: [u8; 32] = hasher.finalize().into();
    Ok(on_disk == content_digest(data))
}

/// Whether a file name is one of our in-progress temporary files
pub fn is_temp_file_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.ends_with(TEMP_SUFFIX)
}
