//! Callback Scheduler
//!
//! The engine never runs a response or watch callback on the caller's
//! stack. Every callback is handed to a [`Scheduler`] while the store lock is
//! held and runs later, after the lock is released.
//!
//! ## Ordering
//! Both implementations run jobs strictly in submission order. Since the
//! engine submits while holding its lock, callbacks observe mutations in the
//! order they were applied.
//!
//! ## Implementations
//! - [`CallbackExecutor`]: one worker thread fed by an unbounded channel
//! - [`ManualScheduler`]: queues jobs until [`ManualScheduler::run_pending`]
//!   is called (deterministic tests)

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{self, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::error::Result;

/// A zero-argument unit of deferred work
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Accepts work and runs it later, off the caller's stack.
pub trait Scheduler: Send + Sync {
    /// Queue `job`. Must not run it before returning.
    fn schedule(&self, job: Job);

    /// True when called from inside one of this scheduler's own jobs.
    /// Waiting there for a later job never returns.
    fn in_callback(&self) -> bool {
        false
    }
}

fn run_job(job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("Scheduled callback panicked");
    }
}

// =============================================================================
// Threaded Executor
// =============================================================================

/// Runs scheduled jobs on a dedicated worker thread, FIFO.
pub struct CallbackExecutor {
    /// Job queue (None once shut down)
    sender: Mutex<Option<Sender<Job>>>,

    /// Worker handle (None once joined)
    worker: Mutex<Option<JoinHandle<()>>>,

    worker_id: ThreadId,
}

impl CallbackExecutor {
    /// Spawn the worker thread.
    pub fn start(thread_name: &str) -> Result<Self> {
        let (sender, receiver) = channel::unbounded::<Job>();

        let worker = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || {
                debug!("Callback executor started");
                for job in receiver.iter() {
                    run_job(job);
                }
                debug!("Callback executor stopped");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker_id: worker.thread().id(),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Block until every job submitted before this call has run.
    ///
    /// Returns immediately when called from a callback, or after shutdown.
    pub fn drain(&self) {
        if self.in_callback() {
            return;
        }

        let (done_tx, done_rx) = channel::bounded::<()>(1);
        self.schedule(Box::new(move || {
            let _ = done_tx.send(());
        }));

        // Err means the job was dropped because the executor is shut down
        let _ = done_rx.recv();
    }

    /// Stop accepting work, run what is already queued, and join the worker.
    pub fn shutdown(&self) {
        // Dropping the sender ends the worker's receive loop
        self.sender.lock().take();

        if let Some(handle) = self.worker.lock().take() {
            if thread::current().id() == self.worker_id {
                // Joining ourselves would deadlock; the loop ends on its own
                return;
            }
            if handle.join().is_err() {
                warn!("Callback executor thread panicked");
            }
        }
    }
}

impl Scheduler for CallbackExecutor {
    fn schedule(&self, job: Job) {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) => {
                if tx.send(job).is_err() {
                    warn!("Callback executor is gone, dropping job");
                }
            }
            None => warn!("Callback executor is shut down, dropping job"),
        }
    }

    fn in_callback(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl Drop for CallbackExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Manual Scheduler
// =============================================================================

/// Queues jobs until explicitly run. Intended for deterministic tests.
#[derive(Default)]
pub struct ManualScheduler {
    queue: Mutex<VecDeque<Job>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run queued jobs in order until the queue is empty, including jobs
    /// queued by the jobs themselves. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Pop under the lock, run outside it so jobs may schedule more
            let next = self.queue.lock().pop_front();
            match next {
                Some(job) => {
                    run_job(job);
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, job: Job) {
        self.queue.lock().push_back(job);
    }
}
