//! Order-preserving parallel map over independent jobs.
//!
//! Jobs share nothing; each result is tagged with its input index and the
//! batch is sorted by that index before returning, so callers observe the
//! same order as a sequential run whatever the scheduling.

use rayon::prelude::*;
use thiserror::Error;

/// The worker pool could not be started.
#[derive(Debug, Error)]
#[error("failed to start a pool of {workers} worker thread(s): {source}")]
pub struct ParallelError {
    workers: usize,
    #[source]
    source: rayon::ThreadPoolBuildError,
}

/// Applies `f` to every item, returning `(input_index, result)` pairs in
/// input order.
///
/// `workers` of 0 or 1 runs in the calling thread. Otherwise a dedicated
/// pool with `workers` threads runs the jobs. A panic in any job propagates
/// to the caller and fails the whole batch.
pub fn map_parallel<T, R, F>(
    items: Vec<T>,
    workers: usize,
    f: F,
) -> Result<Vec<(usize, R)>, ParallelError>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    if workers <= 1 {
        return Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, item)| (index, f(item)))
            .collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("annox-worker-{i}"))
        .build()
        .map_err(|source| ParallelError { workers, source })?;

    tracing::debug!(workers, jobs = items.len(), "running batch on worker pool");

    let mut results: Vec<(usize, R)> = pool.install(|| {
        items
            .into_par_iter()
            .enumerate()
            .map(|(index, item)| (index, f(item)))
            .collect()
    });
    results.sort_by_key(|(index, _)| *index);
    Ok(results)
}
