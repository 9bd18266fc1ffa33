//! Moving completed transfers into place
//!
//! A finished transfer lives in a staging file. Before any caller is told the
//! download succeeded, the file is moved to its destination: a rename when
//! staging and destination share a filesystem, otherwise a copy into a
//! sibling temp file that is then renamed. Either way a destination holds
//! the old contents or the complete new file, never a partial one.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use url::Url;

use crate::constants::files;

/// Move a staged download to `destination`, replacing any existing file
///
/// The parent directory is created if needed. On failure the staging file
/// is removed when `temp` is dropped.
pub fn persist_download(temp: TempPath, destination: &Path) -> io::Result<PathBuf> {
    ensure_parent(destination)?;

    match temp.persist(destination) {
        Ok(()) => {}
        Err(e) if is_cross_device(&e.error) => {
            let temp = e.path;
            copy_into_place(&temp, destination)?;
            drop(temp);
        }
        Err(e) => return Err(e.error),
    }

    tracing::debug!("Persisted download to {}", destination.display());
    Ok(destination.to_path_buf())
}

/// Copy `source` to `destination` atomically, replacing any existing file
///
/// The copy is written next to `destination` and renamed over it, so a
/// failed copy leaves nothing behind.
pub fn copy_into_place(source: &Path, destination: &Path) -> io::Result<PathBuf> {
    let parent = ensure_parent(destination)?;

    let staged = tempfile::Builder::new()
        .prefix(files::STAGING_PREFIX)
        .suffix(files::TEMP_FILE_SUFFIX)
        .tempfile_in(parent)?;
    std::fs::copy(source, staged.path())?;
    staged.persist(destination).map_err(|e| e.error)?;

    tracing::debug!(
        "Copied {} to {}",
        source.display(),
        destination.display()
    );
    Ok(destination.to_path_buf())
}

/// Create the directory `path` will live in and return it
fn ensure_parent(path: &Path) -> io::Result<&Path> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(parent)
        }
        _ => Ok(Path::new(".")),
    }
}

/// Reserve a unique destination under `download_dir` for `url`
///
/// The file name keeps the URL's extension so the result stays recognizable.
pub fn generated_destination(download_dir: &Path, url: &Url) -> io::Result<PathBuf> {
    std::fs::create_dir_all(download_dir)?;

    let extension = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    let reserved = tempfile::Builder::new()
        .prefix(files::DOWNLOAD_PREFIX)
        .suffix(&extension)
        .tempfile_in(download_dir)?
        .into_temp_path();
    reserved.keep().map_err(|e| e.error)
}

#[cfg(unix)]
fn is_cross_device(error: &io::Error) -> bool {
    // EXDEV
    error.raw_os_error() == Some(18)
}

#[cfg(windows)]
fn is_cross_device(error: &io::Error) -> bool {
    // ERROR_NOT_SAME_DEVICE
    error.raw_os_error() == Some(17)
}

#[cfg(not(any(unix, windows)))]
fn is_cross_device(_error: &io::Error) -> bool {
    false
}
