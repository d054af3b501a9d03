use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, instrument, warn};

use crate::storage::{Error, Result};

/// Reads the whole file at `path` as UTF-8 text.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if the file does not exist.
#[instrument(fields(path = %path.display()))]
pub async fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).await.map_err(|e| {
        warn!("Failed to read file: {}", e);
        Error::from_io(path, e)
    })
}

/// Overwrites the file at `path` with `content`, creating parent directories as needed.
#[instrument(skip(content), fields(path = %path.display(), bytes = content.len()))]
pub async fn save_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(Error::Io)?;
    }
    fs::write(path, content).await.map_err(|e| {
        warn!("Failed to write file: {}", e);
        Error::Io(e)
    })?;
    debug!("File saved");
    Ok(())
}

/// Reads a text file, treating a missing file as `None`.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD, so a sidecar saved in a legacy
/// encoding still reads.
pub(crate) async fn read_optional_text(path: &Path) -> Result<Option<String>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!("'{}' is not valid UTF-8, replacing invalid bytes", path.display());
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };
    Ok(Some(text))
}

/// Reads and deserializes a JSON file, treating a missing file as `None`.
///
/// A file that exists but does not parse is reported as [`Error::Parse`].
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = match fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    serde_json::from_slice(&content)
        .map(Some)
        .map_err(|source| Error::Parse { path: path.to_path_buf(), source })
}

/// Serializes `value` with two-space indentation and overwrites `path` with it.
pub(crate) async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).await.map_err(Error::Io)?;
    debug!("JSON written to {}", path.display());
    Ok(())
}
