//! Fixed-size worker pool for the data-parallel steps of a fit.
//!
//! A [`WorkerPool`] is created at the start of a fit and dropped at its end;
//! restarts after a failure build a fresh one. Work is split into `slots`
//! contiguous, non-overlapping index ranges. Each worker reads shared state
//! and returns its own partial result; results come back in range order so
//! the caller can merge them deterministically.
//!
//! Splitting only happens when `slots > 1` and there are at least twice as
//! many records as slots. Without the `parallel` feature everything runs on
//! the calling thread.

use crate::error::{Error, Result};
use std::ops::Range;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Worker pool scoped to a single fit.
#[derive(Debug)]
pub struct WorkerPool {
    slots: usize,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl WorkerPool {
    /// Create a pool with `slots` execution slots (1 = sequential).
    pub fn new(slots: usize) -> Result<Self> {
        if slots == 0 {
            return Err(Error::invalid("execution_slots", "must be > 0"));
        }

        #[cfg(feature = "parallel")]
        let pool = if slots > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(slots)
                .thread_name(|i| format!("partita-worker-{i}"))
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;
            Some(pool)
        } else {
            None
        };

        Ok(Self {
            slots,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    /// A pool that always runs on the calling thread.
    pub fn sequential() -> Self {
        Self {
            slots: 1,
            #[cfg(feature = "parallel")]
            pool: None,
        }
    }

    /// Configured number of slots.
    pub fn slots(&self) -> usize {
        self.slots
    }

    /// Whether a step over `n` records is split across workers.
    pub fn engaged(&self, n: usize) -> bool {
        #[cfg(feature = "parallel")]
        {
            self.pool.is_some() && n >= 2 * self.slots
        }
        #[cfg(not(feature = "parallel"))]
        {
            let _ = n;
            false
        }
    }

    /// Split `0..n` into `slots` contiguous ranges; the last one takes the remainder.
    pub fn partition(&self, n: usize) -> Vec<Range<usize>> {
        let per_task = n / self.slots;
        (0..self.slots)
            .map(|i| {
                let start = i * per_task;
                let end = if i == self.slots - 1 { n } else { start + per_task };
                start..end
            })
            .collect()
    }

    /// Apply `f` to each range, in parallel when a pool exists. Results keep range order.
    pub fn map_ranges<R, F>(&self, ranges: Vec<Range<usize>>, f: F) -> Vec<R>
    where
        F: Fn(Range<usize>) -> R + Sync + Send,
        R: Send,
    {
        #[cfg(feature = "parallel")]
        if let Some(pool) = &self.pool {
            return pool.install(|| ranges.into_par_iter().map(&f).collect());
        }
        ranges.into_iter().map(f).collect()
    }

    /// Run `f` over `0..n`: one call when not engaged, one call per slot otherwise.
    pub fn run<R, F>(&self, n: usize, f: F) -> Vec<R>
    where
        F: Fn(Range<usize>) -> R + Sync + Send,
        R: Send,
    {
        if self.engaged(n) {
            self.map_ranges(self.partition(n), f)
        } else {
            vec![f(0..n)]
        }
    }
}
