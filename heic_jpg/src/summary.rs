//! End-of-run aggregation and reporting.

use crate::task::{ConversionResult, SkipReason};
use serde::Serialize;
use shared_utils::BatchResult;
use std::path::PathBuf;
use std::time::Duration;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURES: i32 = 1;

/// Totals for one run, folded from every [`ConversionResult`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    #[serde(flatten)]
    pub batch: BatchResult,
    pub input_bytes: u64,
    pub output_bytes: u64,
    /// Originals deleted by `--remove-originals`.
    pub deleted: usize,
    /// Sources a dry run would have converted.
    pub planned: Vec<PathBuf>,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results<'a, I>(results: I) -> Self
    where
        I: IntoIterator<Item = &'a ConversionResult>,
    {
        let mut summary = Self::new();
        for result in results {
            summary.record(result);
        }
        summary
    }

    pub fn record(&mut self, result: &ConversionResult) {
        match result {
            ConversionResult::Converted {
                input_bytes,
                output_bytes,
                removed_original,
                ..
            } => {
                self.batch.success();
                self.input_bytes += input_bytes;
                self.output_bytes += output_bytes;
                if *removed_original {
                    self.deleted += 1;
                }
            }
            ConversionResult::Skipped { source, reason } => {
                self.batch.skip();
                if *reason == SkipReason::DryRun {
                    self.planned.push(source.clone());
                }
            }
            ConversionResult::Failed { source, error } => {
                self.batch.fail(source.clone(), error.clone());
            }
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_secs = elapsed.as_secs_f64();
        self
    }

    pub fn converted(&self) -> usize {
        self.batch.succeeded
    }

    pub fn skipped(&self) -> usize {
        self.batch.skipped
    }

    pub fn failed(&self) -> usize {
        self.batch.failed
    }

    pub fn total(&self) -> usize {
        self.batch.total
    }

    /// Skips are not failures.
    pub fn exit_code(&self) -> i32 {
        if self.failed() == 0 {
            EXIT_OK
        } else {
            EXIT_FAILURES
        }
    }

    pub fn print_human(&self) {
        if !self.planned.is_empty() {
            println!();
            println!("🔍 Dry run: {} file(s) would be converted", self.planned.len());
            for path in &self.planned {
                println!("   {}", path.display());
            }
        }
        shared_utils::print_summary_report(
            &self.batch,
            Duration::from_secs_f64(self.elapsed_secs),
            self.input_bytes,
            self.output_bytes,
            "HEIC → JPG",
        );
        if self.deleted > 0 {
            println!("🗑️  {} original(s) deleted", self.deleted);
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_value(self)?;
        json["exit_code"] = self.exit_code().into();
        serde_json::to_string_pretty(&json)
    }
}
