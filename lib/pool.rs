//! Simple thread pool for running batches of independent circuits.

use std::thread;
use crossbeam::channel;
use rand::{ rngs::StdRng, SeedableRng };
use thiserror::Error;
use tracing::debug;
use crate::{
    circuit::{ self, Operation, RunFailure, RunOutput },
    config::{ NumericConfig, TruncationPolicy },
    mps::MPS,
};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to enqueue circuits: dead thread")]
    DeadThread,

    #[error("failed to enqueue circuits: closed sender channel")]
    ClosedSenderChannel,

    #[error("failed to receive circuit result: receiver error: {0}")]
    ClosedReceiverChannel(channel::RecvError),

    #[error("encountered receiver error from within a thread: receiver error: {0}")]
    WorkerReceiverError(channel::RecvError),
}
use PoolError::*;
pub type PoolResult<T> = Result<T, PoolError>;

/// A circuit to run from a given initial state.
///
/// Measurements draw from a [`StdRng`] seeded with `seed`, so a job's outcome
/// depends only on its own contents.
#[derive(Clone, Debug)]
pub struct CircuitJob {
    pub state: MPS,
    pub ops: Vec<Operation>,
    pub policy: TruncationPolicy,
    pub seed: u64,
}

impl CircuitJob {
    /// Run the job on the current thread.
    pub fn run(self) -> Result<RunOutput, RunFailure> {
        let Self { state, ops, policy, seed } = self;
        circuit::run(state, &ops, policy, StdRng::seed_from_u64(seed))
    }
}

/// Outcome of a single job.
pub type JobResult = Result<RunOutput, RunFailure>;

#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
enum ToWorker {
    Stop,
    Work(usize, CircuitJob),
}

#[allow(clippy::large_enum_variant)]
#[derive(Debug)]
enum FromWorker {
    RecvError(channel::RecvError),
    Output(usize, JobResult),
}

/// A simple thread pool to run independent circuits in parallel.
///
/// Workload between threads is automatically balanced by means of a
/// single-producer, multiple-consumer channel. Every job owns its state, so no
/// data is shared between threads. The pool as a whole is meant to be reused
/// between batches, and is **not** thread-safe.
#[derive(Debug)]
pub struct CircuitPool {
    threads: Vec<thread::JoinHandle<()>>,
    workers_in: channel::Sender<ToWorker>,
    workers_out: channel::Receiver<FromWorker>,
}

impl CircuitPool {
    /// Create a new thread pool of `nthreads` threads.
    pub fn new(nthreads: usize) -> Self {
        let nthreads = nthreads.max(1);
        let (tx_in, rx_in) = channel::unbounded();
        let (tx_out, rx_out) = channel::unbounded();
        let mut threads = Vec::with_capacity(nthreads);
        for _ in 0..nthreads {
            let worker_receiver: channel::Receiver<ToWorker> = rx_in.clone();
            let worker_sender: channel::Sender<FromWorker> = tx_out.clone();
            let th = thread::spawn(move || loop {
                match worker_receiver.recv() {
                    Ok(ToWorker::Stop) => { break; },
                    Ok(ToWorker::Work(idx, job)) => {
                        let res = job.run();
                        if worker_sender.send(FromWorker::Output(idx, res)).is_err() {
                            break;
                        }
                    },
                    Err(err) => {
                        worker_sender.send(FromWorker::RecvError(err)).ok();
                        break;
                    },
                }
            });
            threads.push(th);
        }
        Self { threads, workers_in: tx_in, workers_out: rx_out }
    }

    /// Create a new thread pool sized by [`NumericConfig::threads`].
    pub fn from_config(config: &NumericConfig) -> Self { Self::new(config.threads()) }

    /// Create a new thread pool with the number of threads equal to the number
    /// of logical CPU cores available in the current system.
    pub fn new_cpus() -> Self { Self::new(num_cpus::get()) }

    /// Return the number of worker threads.
    pub fn nthreads(&self) -> usize { self.threads.len() }

    /// Enqueue a batch of jobs to be distributed across all threads.
    ///
    /// This method will block until all enqueued jobs have finished. Results
    /// are returned in the order the jobs were given, regardless of the order
    /// in which they finished; a failed circuit is reported in its slot and
    /// does not affect the others.
    pub fn run_batch<I>(&self, jobs: I) -> PoolResult<Vec<JobResult>>
    where I: IntoIterator<Item = CircuitJob>
    {
        if self.threads.iter().any(|th| th.is_finished()) {
            return Err(DeadThread);
        }
        let mut count: usize = 0;
        for job in jobs.into_iter() {
            match self.workers_in.send(ToWorker::Work(count, job)) {
                Ok(()) => { count += 1; },
                Err(_) => { return Err(ClosedSenderChannel); },
            }
        }
        debug!(jobs = count, threads = self.threads.len(), "dispatched batch");
        let mut output: Vec<Option<JobResult>> = (0..count).map(|_| None).collect();
        for _ in 0..count {
            match self.workers_out.recv() {
                Ok(FromWorker::Output(idx, res)) => { output[idx] = Some(res); },
                Ok(FromWorker::RecvError(err)) => {
                    return Err(WorkerReceiverError(err));
                },
                Err(err) => { return Err(ClosedReceiverChannel(err)); },
            }
        }
        // every index in 0..count is received exactly once
        Ok(output.into_iter().flatten().collect())
    }
}

impl Drop for CircuitPool {
    fn drop(&mut self) {
        (0..self.threads.len())
            .for_each(|_| { self.workers_in.send(ToWorker::Stop).ok(); });
        self.threads.drain(..)
            .for_each(|th| { th.join().ok(); });
    }
}
