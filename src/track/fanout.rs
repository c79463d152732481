use super::cancel::Cancellation;
use crate::types::GenomicRange;
use crate::{Error, Result};
use rayon::ThreadPool;
use rayon::prelude::*;

/// Run `work` over each sub-window and collect results in window order.
///
/// Workers share a child of `cancel`; the first worker to fail cancels its
/// siblings. The reported error is the first non-`Cancelled` one in window
/// order, or `Cancelled` when that is all there is.
pub fn fan_out<T, F>(
    pool: Option<&ThreadPool>,
    windows: &[GenomicRange],
    cancel: &Cancellation,
    work: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, &GenomicRange, &Cancellation) -> Result<T> + Sync,
{
    if let [window] = windows {
        return work(0, window, cancel).map(|part| vec![part]);
    }

    let siblings = cancel.child();
    let run = || {
        windows
            .par_iter()
            .enumerate()
            .map(|(i, window)| {
                let result = work(i, window, &siblings);
                if result.is_err() {
                    siblings.cancel();
                }
                result
            })
            .collect::<Vec<Result<T>>>()
    };

    let results = match pool {
        Some(pool) => pool.install(run),
        None => run(),
    };

    let mut parts = Vec::with_capacity(results.len());
    let mut cancelled = false;
    for result in results {
        match result {
            Ok(part) => parts.push(part),
            Err(Error::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }

    if cancelled {
        return Err(Error::Cancelled);
    }
    Ok(parts)
}
