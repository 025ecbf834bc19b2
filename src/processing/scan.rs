//! Non-recursive discovery of images inside a configured directory

use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::PNG_SUFFIX;
use crate::error::{Result, FastPngError};

/// A file selected for optimization by its name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageCandidate {
    path: PathBuf,
}

impl ImageCandidate {
    pub(crate) fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// True if `name` ends with `.png` (exact, case-sensitive)
pub fn is_image_candidate(name: &str) -> bool {
    name.ends_with(PNG_SUFFIX)
}

/// Check that `path` exists and is a directory
pub fn validate_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(FastPngError::DirectoryNotFound { path: path.to_path_buf() });
    }

    if !path.is_dir() {
        return Err(FastPngError::NotADirectory { path: path.to_path_buf() });
    }

    Ok(())
}

/// List the image candidates directly inside `path`
///
/// Entries come back in the order the filesystem lists them. Subdirectories
/// are skipped even when their name matches.
pub fn scan_directory(path: &Path) -> Result<Vec<ImageCandidate>> {
    validate_directory(path)?;

    let entries = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .collect::<std::result::Result<Vec<_>, walkdir::Error>>()?;

    let candidates: Vec<ImageCandidate> = entries
        .into_iter()
        .filter(|entry| !entry.path().is_dir())
        .filter(|entry| is_image_candidate(&entry.file_name().to_string_lossy()))
        .map(|entry| ImageCandidate::new(entry.into_path()))
        .collect();

    debug!("Found {} image(s) in {:?}", candidates.len(), path);
    Ok(candidates)
}
