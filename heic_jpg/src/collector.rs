//! HEIC discovery.

use crate::output::{OUTPUT_DIR_NAME, SYNOLOGY_METADATA_DIR};
use shared_utils::img_errors::{ConvertError, Result};
use std::path::{Path, PathBuf};

pub const HEIC_EXTENSIONS: &[&str] = &["heic"];

/// A discovered HEIC file. Immutable once collected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    path: PathBuf,
    parent: PathBuf,
}

impl SourceFile {
    pub fn new(path: PathBuf) -> Self {
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self { path, parent }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parent(&self) -> &Path {
        &self.parent
    }
}

/// Recursively collect `*.heic` files (any case) under `root`, sorted by path.
///
/// `<root>/ConvertedFiles` and Synology `@eaDir` directories are not entered.
pub fn collect_heic_files(root: &Path) -> Result<Vec<SourceFile>> {
    if !root.is_dir() {
        return Err(ConvertError::NotFound(root.to_path_buf()));
    }

    let files = shared_utils::collect_files(root, HEIC_EXTENSIONS, |entry| {
        (entry.depth() == 1 && entry.file_name() == OUTPUT_DIR_NAME)
            || entry.file_name() == SYNOLOGY_METADATA_DIR
    });

    tracing::debug!(root = %root.display(), count = files.len(), "Collected HEIC files");

    Ok(files.into_iter().map(SourceFile::new).collect())
}
