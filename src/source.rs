//! Raw page source for the CLI.
//!
//! Reads a directory of crawled page blobs, one file per page, as saved by
//! the fetcher:
//!
//! ```text
//! raw/
//! ├── 1-overview.html
//! ├── 2-getting-started.html
//! ├── 2.1-installation.html
//! └── api/
//!     └── 3-reference.html
//! ```
//!
//! Each file's path relative to the source root, without extension, is its
//! slug (`api/3-reference`). Files are returned sorted by that relative
//! path, which is the crawl order the catalog dedup relies on. Hidden files
//! and directories are skipped.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions treated as raw page blobs.
pub const RAW_EXTENSIONS: &[&str] = &["html", "htm", "txt", "js", "json"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Source directory not found: {0}")]
    NotFound(PathBuf),
}

/// One crawled page blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// Relative path without extension, `/`-separated.
    pub slug: String,
    pub text: String,
}

impl RawPage {
    pub fn new(slug: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            text: text.into(),
        }
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|n| n.starts_with('.'))
}

fn is_raw_blob(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| RAW_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Read every raw blob under `root`, sorted by relative path.
pub fn read_sources(root: &Path) -> Result<Vec<RawPage>, SourceError> {
    if !root.is_dir() {
        return Err(SourceError::NotFound(root.to_path_buf()));
    }

    let mut found: Vec<(String, PathBuf)> = Vec::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() || !is_raw_blob(entry.path()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let slug = relative
            .with_extension("")
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        found.push((slug, entry.path().to_path_buf()));
    }
    found.sort();

    let mut pages = Vec::with_capacity(found.len());
    for (slug, path) in found {
        let bytes = std::fs::read(&path)?;
        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => {
                warn!(path = %path.display(), "blob is not valid UTF-8, decoding lossily");
                String::from_utf8_lossy(err.as_bytes()).into_owned()
            }
        };
        debug!(%slug, bytes = text.len(), "read raw blob");
        pages.push(RawPage { slug, text });
    }
    Ok(pages)
}
