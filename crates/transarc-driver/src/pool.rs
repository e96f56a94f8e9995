//! Fixed-size worker pool fed through a bounded queue

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread;

use log::{debug, warn};

/// Runs one stage's work items on scoped worker threads
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerPool {
    workers: usize,
    queue_capacity: usize,
    fail_fast: bool,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_capacity: usize, fail_fast: bool) -> Self {
        Self {
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
            fail_fast,
        }
    }

    /// Apply `work` to every item; results come back in item order
    ///
    /// `None` marks an item that was never worked on because an earlier
    /// result was a failure and the pool is fail-fast.
    pub fn run<T, R, W, F>(&self, items: Vec<T>, work: W, failed: F) -> Vec<Option<R>>
    where
        T: Send,
        R: Send,
        W: Fn(T) -> R + Sync,
        F: Fn(&R) -> bool + Sync,
    {
        let total = items.len();
        let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
        if total == 0 {
            return results;
        }

        let (job_tx, job_rx) = mpsc::sync_channel::<(usize, T)>(self.queue_capacity);
        let job_rx = Mutex::new(job_rx);
        let (result_tx, result_rx) = mpsc::channel::<(usize, R)>();
        let abort = AtomicBool::new(false);
        let fail_fast = self.fail_fast;
        let workers = self.workers.min(total);
        debug!("scheduling {} item(s) on {} worker(s)", total, workers);

        thread::scope(|scope| {
            for _ in 0..workers {
                let result_tx = result_tx.clone();
                let (job_rx, abort, work, failed) = (&job_rx, &abort, &work, &failed);
                scope.spawn(move || loop {
                    let next = job_rx.lock().unwrap_or_else(PoisonError::into_inner).recv();
                    let Ok((index, item)) = next else { break };
                    if abort.load(Ordering::Acquire) {
                        continue;
                    }
                    let result = work(item);
                    if fail_fast && failed(&result) {
                        abort.store(true, Ordering::Release);
                    }
                    if result_tx.send((index, result)).is_err() {
                        break;
                    }
                });
            }
            drop(result_tx);

            for (index, item) in items.into_iter().enumerate() {
                if abort.load(Ordering::Acquire) {
                    warn!("fail-fast: {} item(s) left unscheduled", total - index);
                    break;
                }
                if job_tx.send((index, item)).is_err() {
                    break;
                }
            }
            drop(job_tx);
        });

        for (index, result) in result_rx {
            results[index] = Some(result);
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_in_item_order() {
        let pool = WorkerPool::new(4, 2, false);
        let results = pool.run((0..50).collect(), |n: u32| n * n, |_| false);
        let squares: Vec<u32> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(squares, (0..50).map(|n| n * n).collect::<Vec<_>>());
    }

    #[test]
    fn test_failures_do_not_stop_a_tolerant_pool() {
        let pool = WorkerPool::new(2, 300, false);
        let results = pool.run(vec![1, 2, 3], |n: i32| n % 2 == 0, |ok| !ok);
        assert!(results.iter().all(Option::is_some));
    }

    #[test]
    fn test_fail_fast_single_worker_skips_the_rest() {
        let pool = WorkerPool::new(1, 1, true);
        let results = pool.run(vec![0, 1, 2, 3, 4], |n: i32| n, |n| *n == 1);
        assert_eq!(results[0], Some(0));
        assert_eq!(results[1], Some(1));
        assert!(results[2..].iter().all(Option::is_none));
    }

    #[test]
    fn test_empty_input() {
        let pool = WorkerPool::new(3, 10, true);
        let results: Vec<Option<i32>> = pool.run(Vec::new(), |n: i32| n, |_| true);
        assert!(results.is_empty());
    }
}
