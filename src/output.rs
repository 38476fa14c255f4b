//! Result file.

use crate::comment::Comment;
use crate::Result;
use std::path::Path;
use tracing::{info, warn};

/// Write `comments` to `path` as pretty-printed JSON, creating parent
/// directories as needed.
///
/// Nothing is written for an empty list; returns whether a file was written.
pub fn write_comments(path: impl AsRef<Path>, comments: &[Comment]) -> Result<bool> {
    let path = path.as_ref();
    if comments.is_empty() {
        warn!("no comments to save, {} not written", path.display());
        return Ok(false);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(comments)?;
    std::fs::write(path, json)?;

    info!("saved {} comments to {}", comments.len(), path.display());
    Ok(true)
}
