//! One full run: collect, confirm, plan, convert, summarize.

use crate::collector::collect_heic_files;
use crate::decoder::HeicDecoder;
use crate::dispatcher::dispatch;
use crate::options::ConversionOptions;
use crate::output::{Confirm, OutputManager};
use crate::summary::RunSummary;
use crate::task::{run_conversion, ConversionResult};
use shared_utils::img_errors::Result;
use std::path::Path;
use std::time::Instant;

/// Progress hooks. `finished` is called from worker threads.
pub trait RunObserver: Sync {
    fn started(&self, _total: usize) {}
    fn finished(&self, _result: &ConversionResult) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RunObserver for NoopObserver {}

/// Convert every HEIC file under `root` into `<root>/ConvertedFiles`.
///
/// Returns `Err` only for setup failures, before any file is touched.
/// Per-file failures are reported in the summary.
pub fn run(
    root: &Path,
    options: &ConversionOptions,
    decoder: &dyn HeicDecoder,
    confirm: &dyn Confirm,
    observer: &dyn RunObserver,
) -> Result<RunSummary> {
    let start = Instant::now();

    let files = collect_heic_files(root)?;
    if files.is_empty() {
        tracing::info!(root = %root.display(), "No HEIC files found");
        return Ok(RunSummary::new().with_elapsed(start.elapsed()));
    }
    tracing::info!(
        root = %root.display(),
        files = files.len(),
        quality = options.quality(),
        workers = options.workers(),
        dry_run = options.dry_run(),
        remove_originals = options.remove_originals(),
        "Starting conversion"
    );

    let output = OutputManager::new(root, options.dry_run());
    if options.remove_originals() {
        output.guard_removal()?;
    }
    output.prepare(confirm)?;

    let jobs = output.plan(files);
    output.create_dirs(&jobs)?;

    observer.started(jobs.len());
    let results = dispatch(
        &jobs,
        options.workers(),
        |job| run_conversion(job, options, decoder, &output),
        |result| observer.finished(result),
    )?;

    let summary = RunSummary::from_results(&results).with_elapsed(start.elapsed());
    tracing::info!(
        converted = summary.converted(),
        skipped = summary.skipped(),
        failed = summary.failed(),
        elapsed_secs = summary.elapsed_secs,
        "Run finished"
    );
    Ok(summary)
}
