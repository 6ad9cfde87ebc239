//! Output directory management.
//!
//! Owns everything that writes outside a single output file: resolving and
//! creating `ConvertedFiles`, confirming reuse of a non-empty one, choosing a
//! unique output path per source, and deleting originals.

use crate::collector::SourceFile;
use console::Term;
use shared_utils::img_errors::{ConvertError, Result};
use std::collections::{BTreeSet, HashSet};
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const OUTPUT_DIR_NAME: &str = "ConvertedFiles";
/// Synology keeps per-file thumbnails in `<dir>/@eaDir/<file name>/`.
pub const SYNOLOGY_METADATA_DIR: &str = "@eaDir";

/// Answers the "reuse existing output directory?" question.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> io::Result<bool>;
}

/// Asks on the terminal. Non-interactive sessions read an empty answer,
/// which counts as "no".
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> io::Result<bool> {
        let term = Term::stderr();
        term.write_str(&format!("{} [y/N] ", prompt))?;
        let answer = term.read_line()?;
        Ok(matches!(
            answer.trim().to_lowercase().as_str(),
            "y" | "yes"
        ))
    }
}

/// `--yes`
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> io::Result<bool> {
        Ok(true)
    }
}

/// A source paired with the JPG path it will be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub source: SourceFile,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct OutputManager {
    root: PathBuf,
    output_dir: PathBuf,
    dry_run: bool,
}

impl OutputManager {
    pub fn new(root: &Path, dry_run: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            output_dir: root.join(OUTPUT_DIR_NAME),
            dry_run,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Refuse to delete originals under protected system directories.
    pub fn guard_removal(&self) -> Result<()> {
        shared_utils::check_safe_for_destructive(&self.root, "delete")
            .map_err(ConvertError::UnsafeDirectory)
    }

    /// Confirm reuse of a non-empty output directory, then create it.
    ///
    /// In a dry run nothing is asked and nothing is created.
    pub fn prepare(&self, confirm: &dyn Confirm) -> Result<()> {
        if self.dry_run {
            tracing::debug!(dir = %self.output_dir.display(), "Dry run: output directory left untouched");
            return Ok(());
        }

        if is_non_empty_dir(&self.output_dir)? {
            let prompt = format!(
                "Output directory {} already exists and is not empty. Reuse it and overwrite existing files?",
                self.output_dir.display()
            );
            if !confirm.confirm(&prompt)? {
                return Err(ConvertError::ConfirmationDeclined(self.output_dir.clone()));
            }
            tracing::info!(dir = %self.output_dir.display(), "Reusing existing output directory");
        }

        fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }

    /// Assign each source a unique output path.
    ///
    /// The source's directory layout below the root is mirrored under
    /// `ConvertedFiles`. Names that still collide (compared case-insensitively,
    /// e.g. `a.heic` and `a.HEIC`) get `_1`, `_2`, ... suffixes in input order.
    pub fn plan(&self, files: Vec<SourceFile>) -> Vec<ConversionJob> {
        let mut taken: HashSet<String> = HashSet::new();

        files
            .into_iter()
            .map(|source| {
                let relative = source.parent().strip_prefix(&self.root).unwrap_or(Path::new(""));
                let target_dir = self.output_dir.join(relative);
                let stem = source.path().file_stem().unwrap_or_default();

                let mut output = target_dir.join(jpg_name(stem, 0));
                let mut counter = 0;
                while !taken.insert(collision_key(&output)) {
                    counter += 1;
                    output = target_dir.join(jpg_name(stem, counter));
                }
                if counter > 0 {
                    tracing::debug!(
                        source = %source.path().display(),
                        output = %output.display(),
                        "Renamed output to avoid a name collision"
                    );
                }

                ConversionJob { source, output }
            })
            .collect()
    }

    /// Create the mirrored subdirectories once, before any worker starts.
    pub fn create_dirs(&self, jobs: &[ConversionJob]) -> Result<()> {
        if self.dry_run {
            return Ok(());
        }
        let dirs: BTreeSet<&Path> = jobs.iter().filter_map(|job| job.output.parent()).collect();
        for dir in dirs {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Delete a converted original together with its Synology thumbnails.
    pub fn remove_original(&self, source: &SourceFile) -> io::Result<()> {
        fs::remove_file(source.path())?;
        tracing::info!(path = %source.path().display(), "Deleted original");

        if let Some(name) = source.path().file_name() {
            let thumbnails = source.parent().join(SYNOLOGY_METADATA_DIR).join(name);
            if thumbnails.is_dir() {
                if let Err(e) = fs::remove_dir_all(&thumbnails) {
                    tracing::warn!(
                        path = %thumbnails.display(),
                        error = %e,
                        "Failed to remove Synology metadata directory"
                    );
                }
            }
        }
        Ok(())
    }
}

/// `<stem>.jpg` or `<stem>_<n>.jpg`, keeping non-UTF-8 stems intact.
fn jpg_name(stem: &OsStr, counter: usize) -> OsString {
    let mut name = stem.to_os_string();
    if counter > 0 {
        name.push(format!("_{}", counter));
    }
    name.push(".jpg");
    name
}

fn collision_key(path: &Path) -> String {
    path.to_string_lossy().to_lowercase()
}

fn is_non_empty_dir(path: &Path) -> io::Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(path)?.next().is_some())
}
