//! Write-behind worker pool
//!
//! Store mutations run on a small pool of background threads fed by a
//! bounded channel. Failures are caught at the task boundary, logged, and
//! counted; they never reach the caller, who already holds the synchronous
//! cache result.

use crossbeam::channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Barrier, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::Result;

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

enum Task {
    Run(Job),
    Sync(Arc<Barrier>),
}

/// Bounded pool of background writer threads.
pub struct WritePool {
    tx: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    failed: Arc<AtomicU64>,
    size: usize,
}

impl WritePool {
    /// Spawn `workers` threads draining a queue of at most `queue_capacity`
    /// pending jobs. A full queue blocks the submitter instead of dropping
    /// the write.
    pub fn start(workers: usize, queue_capacity: usize) -> Self {
        let size = workers.max(1);
        let (tx, rx) = bounded::<Task>(queue_capacity.max(1));
        let failed = Arc::new(AtomicU64::new(0));

        let mut handles = Vec::with_capacity(size);
        for idx in 0..size {
            let rx: Receiver<Task> = rx.clone();
            let failed = Arc::clone(&failed);
            let handle = thread::Builder::new()
                .name(format!("chestvault-writer-{idx}"))
                .spawn(move || {
                    while let Ok(task) = rx.recv() {
                        match task {
                            Task::Run(job) => {
                                if let Err(err) = job() {
                                    failed.fetch_add(1, Ordering::Relaxed);
                                    tracing::error!("write-behind task failed: {err}");
                                }
                            }
                            Task::Sync(barrier) => {
                                barrier.wait();
                            }
                        }
                    }
                })
                .expect("failed to spawn chestvault writer");
            handles.push(handle);
        }

        Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            failed,
            size,
        }
    }

    /// Queue a store mutation. After shutdown the job is silently dropped.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let sender = self.sender();
        if let Some(tx) = sender {
            let _ = tx.send(Task::Run(Box::new(job)));
        }
    }

    /// Number of background writes that have failed since startup
    pub fn failed_jobs(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Block until every job queued before this call has finished.
    ///
    /// One sync task per worker: each worker parks on the barrier after
    /// draining its share of the queue, so nothing queued earlier can still
    /// be running when this returns.
    pub fn flush(&self) {
        let Some(tx) = self.sender() else { return };
        let barrier = Arc::new(Barrier::new(self.size + 1));
        for _ in 0..self.size {
            if tx.send(Task::Sync(Arc::clone(&barrier))).is_err() {
                return;
            }
        }
        barrier.wait();
    }

    /// Drain queued jobs and join the workers. Safe to call more than once.
    pub fn shutdown(&self) {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(tx);

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn sender(&self) -> Option<Sender<Task>> {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Drop for WritePool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_the_background() {
        let pool = WritePool::start(2, 16);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        pool.flush();
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_failures_are_counted_not_raised() {
        let pool = WritePool::start(1, 16);
        pool.submit(|| Err(Error::Connection("unreachable".to_string())));
        pool.submit(|| Ok(()));

        pool.flush();
        assert_eq!(pool.failed_jobs(), 1);
    }

    #[test]
    fn test_flush_waits_for_slow_jobs() {
        let pool = WritePool::start(2, 16);
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let done = Arc::clone(&done);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(20));
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        pool.flush();
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_shutdown_drains_the_queue() {
        let pool = WritePool::start(1, 16);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 5);

        // submits after shutdown are dropped
        pool.submit(|| Ok(()));
        pool.shutdown();
    }
}
