//! Run options shared read-only by every worker.

use serde::Serialize;
use shared_utils::img_errors::{ConvertError, Result};

pub const DEFAULT_QUALITY: u8 = 90;
pub const MIN_QUALITY: u8 = 1;
pub const MAX_QUALITY: u8 = 100;

/// Validated conversion settings.
///
/// Only constructible through [`ConversionOptions::new`], so `quality` is
/// always within 1..=100 and `workers` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversionOptions {
    quality: u8,
    workers: usize,
    dry_run: bool,
    remove_originals: bool,
    skip_existing: bool,
}

impl ConversionOptions {
    pub fn new(quality: u8, workers: usize) -> Result<Self> {
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(ConvertError::InvalidOption(format!(
                "quality must be between {} and {}, got {}",
                MIN_QUALITY, MAX_QUALITY, quality
            )));
        }
        if workers == 0 {
            return Err(ConvertError::InvalidOption(
                "workers must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            quality,
            workers,
            dry_run: false,
            remove_originals: false,
            skip_existing: false,
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_remove_originals(mut self, remove_originals: bool) -> Self {
        self.remove_originals = remove_originals;
        self
    }

    pub fn with_skip_existing(mut self, skip_existing: bool) -> Self {
        self.skip_existing = skip_existing;
        self
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Originals are never removed in a dry run.
    pub fn remove_originals(&self) -> bool {
        self.remove_originals && !self.dry_run
    }

    pub fn skip_existing(&self) -> bool {
        self.skip_existing
    }
}
