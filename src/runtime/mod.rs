//! Background job runtime for recursive divide-and-conquer work.
//!
//! A [`JobPool`] owns a fixed set of worker threads draining one FIFO run
//! queue. Jobs are arbitrary [`JobBody`] implementations; a running body may
//! spawn children attached to itself through the [`JobScheduler`] it is
//! handed, which is how a recursive computation exposes parallelism without
//! unbounded thread creation.
//!
//! ## Completion protocol
//!
//! Every job carries a `pending` count: 1 for itself plus 1 per live child.
//! When a body returns, its own contribution is retired; when the count hits
//! zero the job is *reclaimed* — its node leaves the arena, its
//! [`on_done`](JobBody::on_done) hook fires, and the decrement cascades to
//! the parent. A parent therefore always outlives its children, and
//! [`join`](JobPool::join) on the root returns only once the entire tree has
//! been reclaimed.
//!
//! The pool is deliberately minimal: no priorities, no cancellation, no
//! panic isolation. A panicking job poisons nothing (state is under
//! `parking_lot` locks) but its tree never completes; treat panics in job
//! bodies as programmer errors.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::error::{BuildError, ConfigError};

mod arena;

use arena::{JobArena, JobNode};
pub use arena::JobId;

/// A unit of pool work.
///
/// `run` executes on a worker thread. `on_done` fires after this job *and
/// every descendant* have finished, at the moment the job's bookkeeping is
/// reclaimed. It runs on a worker thread under the pool's internal lock, so
/// hooks must be short and must not block on pool operations.
pub trait JobBody: Send {
    /// Executes the job. `sched` spawns children under `id`.
    fn run(&mut self, sched: &JobScheduler, id: JobId);

    /// Completion hook; the default does nothing.
    fn on_done(&mut self) {}
}

struct PoolState {
    jobs: JobArena,
    queue: VecDeque<JobId>,
    shutdown: bool,
}

struct PoolShared {
    state: Mutex<PoolState>,
    /// Signaled when the run queue gains an entry (or on shutdown).
    work_ready: Condvar,
    /// Signaled after every job completion so joiners can re-check.
    job_reclaimed: Condvar,
}

/// Spawn handle passed to running jobs.
pub struct JobScheduler {
    shared: Arc<PoolShared>,
}

impl JobScheduler {
    /// Enqueues `body` as a child of `parent`.
    ///
    /// The parent is kept alive (not reclaimed, `on_done` not fired) until
    /// the child and the child's own descendants have all finished.
    pub fn enqueue_child(&self, parent: JobId, body: Box<dyn JobBody>) -> JobId {
        let mut state = self.shared.state.lock();
        debug_assert!(
            state.jobs.contains(parent),
            "enqueue_child on a reclaimed parent"
        );
        if let Some(node) = state.jobs.get_mut(parent) {
            node.pending += 1;
        }
        let id = state.jobs.insert(JobNode {
            body: Some(body),
            parent: Some(parent),
            pending: 1,
        });
        state.queue.push_back(id);
        drop(state);
        self.shared.work_ready.notify_one();
        id
    }
}

/// Fixed-size worker pool executing [`JobBody`] trees.
///
/// Dropping the pool signals shutdown and joins the workers. Outstanding
/// jobs that have not started are abandoned, so callers are expected to
/// `join` the trees they care about first (the sort engine always does).
pub struct JobPool {
    shared: Arc<PoolShared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl JobPool {
    /// Starts a pool with `threads` workers.
    ///
    /// Fails with [`BuildError::Config`] for a zero count and
    /// [`BuildError::ThreadSpawn`] if the OS refuses a worker thread.
    pub fn new(threads: usize) -> Result<Self, BuildError> {
        if threads == 0 {
            return Err(ConfigError::new("worker count must be > 0").into());
        }
        log::info!("starting job pool ({} workers)", threads);

        let shared = Arc::new(PoolShared {
            state: Mutex::new(PoolState {
                jobs: JobArena::new(),
                queue: VecDeque::new(),
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            job_reclaimed: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let shared_worker = shared.clone();
            let spawned = thread::Builder::new()
                .name(format!("emkit-worker-{i}"))
                .spawn(move || worker_loop(shared_worker));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    // Drop the partial pool so already-spawned workers exit.
                    drop(JobPool { shared, workers });
                    return Err(BuildError::ThreadSpawn(err));
                }
            }
        }

        Ok(Self { shared, workers })
    }

    /// Number of worker threads to use when the caller expresses no
    /// preference: the machine's available parallelism.
    pub fn default_threads() -> usize {
        thread::available_parallelism().map_or(1, |n| n.get())
    }

    /// Returns the number of worker threads.
    #[inline]
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Enqueues `body` as a root job (no parent) and returns its id.
    pub fn enqueue(&self, body: Box<dyn JobBody>) -> JobId {
        let mut state = self.shared.state.lock();
        let id = state.jobs.insert(JobNode {
            body: Some(body),
            parent: None,
            pending: 1,
        });
        state.queue.push_back(id);
        drop(state);
        self.shared.work_ready.notify_one();
        id
    }

    /// Blocks until the job `id` and all of its descendants have finished
    /// and been reclaimed. Returns immediately if `id` is already gone.
    pub fn join(&self, id: JobId) {
        let mut state = self.shared.state.lock();
        while state.jobs.contains(id) {
            self.shared.job_reclaimed.wait(&mut state);
        }
    }

}

impl Drop for JobPool {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
        }
        self.shared.work_ready.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        log::debug!("job pool stopped");
    }
}

fn worker_loop(shared: Arc<PoolShared>) {
    let sched = JobScheduler {
        shared: shared.clone(),
    };
    loop {
        // Wait for a runnable job or shutdown.
        let (id, mut body) = {
            let mut state = shared.state.lock();
            loop {
                if state.shutdown {
                    return;
                }
                if let Some(id) = state.queue.pop_front() {
                    // A queued job is always live and has not run yet.
                    match state.jobs.get_mut(id).and_then(|node| node.body.take()) {
                        Some(body) => break (id, body),
                        None => {
                            debug_assert!(false, "queued job without a body");
                            continue;
                        }
                    }
                }
                shared.work_ready.wait(&mut state);
            }
        };

        body.run(&sched, id);

        // Retire this job's own pending contribution and cascade reclaims
        // up the tree. Hooks fire at the moment of reclaim, children before
        // parents, so that a join observed as complete implies every hook
        // has already run.
        {
            let mut state = shared.state.lock();
            if let Some(node) = state.jobs.get_mut(id) {
                node.body = Some(body);
            }
            let mut cur = Some(id);
            while let Some(i) = cur {
                let Some(node) = state.jobs.get_mut(i) else { break };
                node.pending -= 1;
                if node.pending > 0 {
                    break;
                }
                let Some(mut node) = state.jobs.remove(i) else { break };
                if let Some(b) = node.body.as_mut() {
                    b.on_done();
                }
                cur = node.parent;
            }
        }
        shared.job_reclaimed.notify_all();
    }
}
