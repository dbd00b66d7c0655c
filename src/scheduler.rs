//! A thin façade over the worker pool.
//!
//! The protocol's parallel boundaries are all data-parallel batches of
//! independent closures: per-selection tally accumulation and per-selection
//! decryption-share computation. Each task owns its inputs and returns an
//! owned result; results come back in submission order after all tasks in
//! the batch complete, so no shared mutable state ever crosses a task
//! boundary.

use rayon::prelude::*;

/// Run a batch of independent tasks on the bounded work-stealing pool and
/// join, preserving submission order.
pub fn schedule<T, F>(tasks: Vec<F>) -> Vec<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    tasks.into_par_iter().map(|task| task()).collect()
}
