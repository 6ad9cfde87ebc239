//! Bounded fan-out of conversion jobs over a dedicated rayon pool.

use crate::output::ConversionJob;
use crate::task::ConversionResult;
use rayon::prelude::*;
use shared_utils::img_errors::{ConvertError, Result};
use std::panic::{self, AssertUnwindSafe};

/// Run `task` for every job with at most `workers` running at once.
///
/// Blocks until all jobs are done. `on_result` is called from the worker
/// threads as each job finishes. Result order is unspecified.
pub fn dispatch<F, C>(
    jobs: &[ConversionJob],
    workers: usize,
    task: F,
    on_result: C,
) -> Result<Vec<ConversionResult>>
where
    F: Fn(&ConversionJob) -> ConversionResult + Sync,
    C: Fn(&ConversionResult) + Sync,
{
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let threads = workers.min(jobs.len()).max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("heic2jpg-worker-{}", i))
        .build()
        .map_err(|e| ConvertError::ThreadPool(e.to_string()))?;

    tracing::debug!(jobs = jobs.len(), threads, "Dispatching conversion jobs");

    let results: Vec<ConversionResult> = pool.install(|| {
        jobs.par_iter()
            .map(|job| {
                let result = run_isolated(job, &task);
                on_result(&result);
                result
            })
            .collect()
    });

    Ok(results)
}

/// A panicking task becomes a `Failed` result instead of tearing down the pool.
fn run_isolated<F>(job: &ConversionJob, task: &F) -> ConversionResult
where
    F: Fn(&ConversionJob) -> ConversionResult,
{
    panic::catch_unwind(AssertUnwindSafe(|| task(job))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::error!(source = %job.source.path().display(), panic = %message, "Conversion task panicked");
        ConversionResult::Failed {
            source: job.source.path().to_path_buf(),
            error: format!("conversion panicked: {}", message),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::SourceFile;
    use crate::task::SkipReason;
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn jobs(n: usize) -> Vec<ConversionJob> {
        (0..n)
            .map(|i| ConversionJob {
                source: SourceFile::new(PathBuf::from(format!("/in/{}.heic", i))),
                output: PathBuf::from(format!("/out/{}.jpg", i)),
            })
            .collect()
    }

    fn skip(job: &ConversionJob) -> ConversionResult {
        ConversionResult::Skipped {
            source: job.source.path().to_path_buf(),
            reason: SkipReason::DryRun,
        }
    }

    #[test]
    fn test_empty_input() {
        let results = dispatch(&[], 4, skip, |_| {}).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_every_job_yields_one_result() {
        let input = jobs(25);
        let seen = AtomicUsize::new(0);
        let results = dispatch(&input, 4, skip, |_| {
            seen.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

        assert_eq!(results.len(), 25);
        assert_eq!(seen.load(Ordering::Relaxed), 25);
        let sources: HashSet<&Path> = results.iter().map(|r| r.source()).collect();
        assert_eq!(sources.len(), 25);
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let input = jobs(16);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        dispatch(
            &input,
            3,
            |job| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(10));
                active.fetch_sub(1, Ordering::SeqCst);
                skip(job)
            },
            |_| {},
        )
        .unwrap();

        let peak = peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak concurrency {} exceeded 3 workers", peak);
        assert!(peak >= 1);
    }

    #[test]
    fn test_workers_capped_by_job_count() {
        let input = jobs(2);
        let threads = Mutex::new(HashSet::new());
        dispatch(
            &input,
            64,
            |job| {
                threads
                    .lock()
                    .unwrap()
                    .insert(std::thread::current().name().map(str::to_string));
                std::thread::sleep(Duration::from_millis(5));
                skip(job)
            },
            |_| {},
        )
        .unwrap();
        assert!(threads.lock().unwrap().len() <= 2);
    }

    #[test]
    fn test_panic_is_isolated() {
        let input = jobs(6);
        let results = dispatch(
            &input,
            2,
            |job| {
                if job.source.path().ends_with("3.heic") {
                    panic!("boom");
                }
                skip(job)
            },
            |_| {},
        )
        .unwrap();

        assert_eq!(results.len(), 6);
        let failed: Vec<_> = results.iter().filter(|r| r.is_failed()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].source(), Path::new("/in/3.heic"));
        match failed[0] {
            ConversionResult::Failed { error, .. } => assert!(error.contains("boom")),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_single_worker_matches_many_workers() {
        let input = jobs(12);
        let task = |job: &ConversionJob| {
            if job.source.path().to_string_lossy().contains('7') {
                ConversionResult::Failed {
                    source: job.source.path().to_path_buf(),
                    error: "bad".into(),
                }
            } else {
                skip(job)
            }
        };

        let mut one = dispatch(&input, 1, task, |_| {}).unwrap();
        let mut eight = dispatch(&input, 8, task, |_| {}).unwrap();
        one.sort_by(|a, b| a.source().cmp(b.source()));
        eight.sort_by(|a, b| a.source().cmp(b.source()));
        assert_eq!(one, eight);
    }
}
