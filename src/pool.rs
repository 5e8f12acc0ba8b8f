use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{trace, warn};

use crate::error::{ClusterError, Result};

/// Work run by a pool worker over one contiguous range of indices.
pub trait SliceJob: Send + Sync + 'static {
    fn run(&self, range: Range<usize>);
}

/// Lifecycle of a single worker, as seen from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Assigned,
    Running,
    Terminated,
}

impl WorkerState {
    fn load(cell: &AtomicU8) -> Self {
        match cell.load(Ordering::Acquire) {
            0 => WorkerState::Idle,
            1 => WorkerState::Assigned,
            2 => WorkerState::Running,
            _ => WorkerState::Terminated,
        }
    }

    fn store(self, cell: &AtomicU8) {
        cell.store(self as u8, Ordering::Release);
    }
}

enum Command {
    Run(Range<usize>),
    Stop,
}

/// A persistent worker thread bound to one job.
///
/// The task channel holds at most one command and the master tracks
/// whether a completion is still owed, so a new range is never handed
/// over while the previous one is in flight.
pub struct Worker {
    id: usize,
    tasks: Sender<Command>,
    done: Receiver<()>,
    state: Arc<AtomicU8>,
    busy: bool,
    stopping: bool,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn<J: SliceJob>(id: usize, job: Arc<J>) -> Result<Self> {
        let (tasks, inbox) = bounded::<Command>(1);
        let (report, done) = bounded::<()>(1);
        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let shared = Arc::clone(&state);
        let handle = thread::Builder::new()
            .name(format!("relocate-{}", id))
            .spawn(move || {
                trace!("worker {} started", id);
                while let Ok(Command::Run(range)) = inbox.recv() {
                    WorkerState::Running.store(&shared);
                    if panic::catch_unwind(AssertUnwindSafe(|| job.run(range))).is_err() {
                        warn!("worker {} lost: job panicked", id);
                        break;
                    }
                    WorkerState::Idle.store(&shared);
                    if report.send(()).is_err() {
                        break;
                    }
                }
                WorkerState::Terminated.store(&shared);
                trace!("worker {} stopped", id);
            })
            .map_err(|e| ClusterError::Spawn(id, e))?;
        Ok(Self {
            id,
            tasks,
            done,
            state,
            busy: false,
            stopping: false,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::load(&self.state)
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping
    }

    /// Hand `range` to the worker. Waits for the previous range first;
    /// assigning without `await_idle` is a caller error that costs a block,
    /// never an overlap.
    pub fn assign(&mut self, range: Range<usize>) -> Result<()> {
        self.await_idle()?;
        if self.stopping {
            return Err(ClusterError::WorkerStopped(self.id));
        }
        WorkerState::Assigned.store(&self.state);
        self.tasks
            .send(Command::Run(range))
            .map_err(|_| ClusterError::WorkerLost(self.id))?;
        self.busy = true;
        Ok(())
    }

    /// Block until the current range has finished.
    pub fn await_idle(&mut self) -> Result<()> {
        if self.busy {
            self.busy = false;
            self.done
                .recv()
                .map_err(|_| ClusterError::WorkerLost(self.id))?;
        }
        Ok(())
    }

    /// Ask the worker to exit once any in-flight range is done. Idempotent.
    pub fn stop(&mut self) {
        if !self.stopping {
            self.stopping = true;
            let _ = self.tasks.send(Command::Stop);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Fixed set of workers sharing one job, created once and reused for
/// every dispatch.
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    pub fn new<J: SliceJob>(threads: usize, job: Arc<J>) -> Result<Self> {
        if threads == 0 {
            return Err(ClusterError::InvalidThreads);
        }
        let workers = (0..threads)
            .map(|id| Worker::spawn(id, Arc::clone(&job)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { workers })
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Split `[0, n)` into at most `workers` contiguous ranges of
    /// `ceil(n / workers)` indices, the last one shorter.
    pub fn slices(n: usize, workers: usize) -> Vec<Range<usize>> {
        if n == 0 || workers == 0 {
            return Vec::new();
        }
        let size = n.div_ceil(workers);
        (0..n)
            .step_by(size)
            .map(|start| start..(start + size).min(n))
            .collect()
    }

    /// Run the job over `[0, n)` and return once every worker is idle.
    pub fn dispatch(&mut self, n: usize) -> Result<()> {
        let slices = Self::slices(n, self.workers.len());
        let mut first_error = None;
        for (worker, range) in self.workers.iter_mut().zip(slices) {
            if let Err(e) = worker.assign(range) {
                first_error.get_or_insert(e);
            }
        }
        // Full barrier: drain every worker even if one was lost.
        for worker in self.workers.iter_mut() {
            if let Err(e) = worker.await_idle() {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn stop(&mut self) {
        self.workers.iter_mut().for_each(Worker::stop);
    }
}
