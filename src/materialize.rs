//! Writes a [`SiteManifest`] to disk.
//!
//! Virtual paths become relative file paths under the destination, with the
//! extension of the file's [`FileKind`] appended: `zh-cn/pages/1-overview`
//! is written to `<dest>/zh-cn/pages/1-overview.md`, `index` to
//! `<dest>/index.html`, `.nojekyll` as-is.

use crate::naming::normalize_path;
use crate::project::{FileKind, SiteManifest};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Refusing to write virtual path '{0}' outside the output directory")]
    UnsafePath(String),
}

/// Relative on-disk path of a virtual file.
pub fn disk_path(virtual_path: &str, kind: FileKind) -> Result<PathBuf, MaterializeError> {
    let normalized = normalize_path(virtual_path)
        .filter(|p| p == virtual_path)
        .ok_or_else(|| MaterializeError::UnsafePath(virtual_path.to_string()))?;

    let mut path: PathBuf = normalized.split('/').collect();
    if let Some(ext) = kind.extension() {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".");
        name.push(ext);
        path.set_file_name(name);
    }
    Ok(path)
}

/// Write every file of `manifest` under `dest`. Returns the written paths.
pub fn write_site(manifest: &SiteManifest, dest: &Path) -> Result<Vec<PathBuf>, MaterializeError> {
    let mut written = Vec::new();
    for (virtual_path, file) in manifest.files() {
        let path = dest.join(disk_path(virtual_path, file.kind)?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &file.content)?;
        debug!(path = %path.display(), "wrote");
        written.push(path);
    }
    info!(files = written.len(), dest = %dest.display(), "site written");
    Ok(written)
}
