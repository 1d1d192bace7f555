// src/scheduler.rs

//! Bounded download pool
//!
//! Tasks pushed to the [`Scheduler`] run on a fixed-size rayon pool and come
//! back through a channel. [`Scheduler::wait`] blocks until every pushed task
//! has reached a terminal state and hands them back, so one batch is
//! observed as a whole.

use crate::download::{FetchTask, TaskId, Transport};
use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, warn};

pub struct Scheduler {
    pool: ThreadPool,
    transport: Arc<dyn Transport>,
    abort: Arc<AtomicBool>,
    sender: Sender<FetchTask>,
    receiver: Receiver<FetchTask>,
    outstanding: usize,
    next_id: u64,
    progress: Option<Arc<dyn ProgressTracker>>,
}

impl Scheduler {
    /// Create a pool running at most `workers` downloads at once
    pub fn new(workers: usize, transport: Arc<dyn Transport>) -> Result<Self> {
        Self::with_abort(workers, transport, Arc::new(AtomicBool::new(false)))
    }

    /// Like [`Scheduler::new`], sharing an existing abort flag
    pub fn with_abort(
        workers: usize,
        transport: Arc<dyn Transport>,
        abort: Arc<AtomicBool>,
    ) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("plugpack-download-{i}"))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to start download pool: {e}")))?;
        let (sender, receiver) = mpsc::channel();

        Ok(Self {
            pool,
            transport,
            abort,
            sender,
            receiver,
            outstanding: 0,
            next_id: 1,
            progress: None,
        })
    }

    pub fn set_progress(&mut self, progress: Arc<dyn ProgressTracker>) {
        self.progress = Some(progress);
    }

    /// Queue a task; it starts as soon as a worker is free
    pub fn push(&mut self, mut task: FetchTask) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        task.set_id(id);
        task.start();

        let transport = Arc::clone(&self.transport);
        let abort = Arc::clone(&self.abort);
        let sender = self.sender.clone();
        self.outstanding += 1;

        self.pool.spawn(move || {
            task.run(transport.as_ref(), &abort);
            // The receiver only goes away with the scheduler itself
            let _ = sender.send(task);
        });
        id
    }

    /// Whether no task is pending
    pub fn idle(&self) -> bool {
        self.outstanding == 0
    }

    /// Block until every pushed task is done and return them by id order
    pub fn wait(&mut self) -> Vec<FetchTask> {
        let mut finished = Vec::with_capacity(self.outstanding);

        while self.outstanding > 0 {
            match self.receiver.recv() {
                Ok(task) => {
                    self.outstanding -= 1;
                    debug!("Task {} ended: {:?}", task.name(), task.state());
                    if let Some(progress) = &self.progress {
                        progress.increment(1);
                    }
                    finished.push(task);
                }
                Err(_) => {
                    warn!("Download pool hung up with {} tasks pending", self.outstanding);
                    self.outstanding = 0;
                }
            }
        }

        finished.sort_by_key(|task| task.id());
        finished
    }

    /// Ask every queued and running task to stop
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if !self.idle() {
            self.abort();
            for task in self.wait() {
                task.discard();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{MemoryTransport, TaskState};
    use crate::progress::SilentProgress;

    fn transport() -> Arc<dyn Transport> {
        let mut transport = MemoryTransport::new();
        for i in 0..8 {
            transport.serve(&format!("https://example.com/{i}"), format!("body {i}"));
        }
        Arc::new(transport)
    }

    #[test]
    fn test_runs_all_tasks() {
        let mut scheduler = Scheduler::new(2, transport()).unwrap();
        assert!(scheduler.idle());

        for i in 0..8 {
            scheduler.push(FetchTask::memory(&format!("t{i}"), &format!("https://example.com/{i}")));
        }
        assert!(!scheduler.idle());

        let tasks = scheduler.wait();
        assert!(scheduler.idle());
        assert_eq!(tasks.len(), 8);
        for (i, task) in tasks.iter().enumerate() {
            assert_eq!(task.id(), Some(TaskId(i as u64 + 1)));
            assert_eq!(task.state(), TaskState::Success);
            assert_eq!(task.content().unwrap(), format!("body {i}").as_bytes());
        }
    }

    #[test]
    fn test_failures_do_not_stop_batch() {
        let mut scheduler = Scheduler::new(4, transport()).unwrap();
        scheduler.push(FetchTask::memory("ok", "https://example.com/1"));
        scheduler.push(FetchTask::memory("missing", "https://example.com/missing"));

        let tasks = scheduler.wait();
        assert_eq!(tasks[0].state(), TaskState::Success);
        assert_eq!(tasks[1].state(), TaskState::Failure);
    }

    #[test]
    fn test_aborted_scheduler_cancels_tasks() {
        let mut scheduler = Scheduler::new(1, transport()).unwrap();
        scheduler.abort();
        assert!(scheduler.is_aborted());

        scheduler.push(FetchTask::memory("t", "https://example.com/0"));
        let tasks = scheduler.wait();
        assert_eq!(tasks[0].state(), TaskState::Cancelled);
    }

    #[test]
    fn test_progress_counts_finished_tasks() {
        let progress = Arc::new(SilentProgress::new());
        let mut scheduler = Scheduler::new(2, transport()).unwrap();
        scheduler.set_progress(progress.clone());
        progress.start_phase("Downloading", 3);

        for i in 0..3 {
            scheduler.push(FetchTask::memory("t", &format!("https://example.com/{i}")));
        }
        scheduler.wait();
        assert_eq!(progress.position(), 3);
    }

    #[test]
    fn test_wait_on_empty_scheduler() {
        let mut scheduler = Scheduler::new(1, transport()).unwrap();
        assert!(scheduler.wait().is_empty());
    }
}
