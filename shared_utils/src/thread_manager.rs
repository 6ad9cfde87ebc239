//! Thread allocation for batch conversion.
//!
//! Treats CPU cores as a fixed budget: keep some room for the OS and UI and
//! split the remainder between parallel tasks.

use std::sync::OnceLock;

static DEFAULT_WORKERS: OnceLock<usize> = OnceLock::new();

/// Cores each decode keeps busy (libheif and the encoder use their own threads).
const THREADS_PER_TASK: usize = 2;
const MAX_PARALLEL_TASKS: usize = 8;

/// Parallel tasks for an image workload on a machine with `total_cores`.
///
/// Reserves 20% of cores (min 1, max 2) and caps parallel tasks at 8 to
/// limit IO contention.
pub fn balanced_parallel_tasks(total_cores: usize) -> usize {
    let reserved = ((total_cores as f64 * 0.2).ceil() as usize).clamp(1, 2);
    let available_cores = total_cores.saturating_sub(reserved).max(1);

    (available_cores / THREADS_PER_TASK).clamp(1, MAX_PARALLEL_TASKS)
}

/// Default worker count for this machine (cached).
pub fn default_worker_count() -> usize {
    *DEFAULT_WORKERS.get_or_init(|| {
        let cores = num_cpus::get();
        let parallel_tasks = balanced_parallel_tasks(cores);
        tracing::debug!(cores, parallel_tasks, "Computed default worker count");
        parallel_tasks
    })
}
