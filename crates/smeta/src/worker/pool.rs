use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::Pipeline;
use crate::worker::job::{Job, JobResult};

/// Submitting side of the pool, handed to request intake.
#[derive(Clone)]
pub struct JobQueue {
    sender: Sender<Job>,
    shutdown: Arc<AtomicBool>,
}

impl JobQueue {
    /// Queues a job. Never blocks; fails once the pool is shutting down.
    pub fn submit(&self, job: Job) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.sender
            .send(job)
            .map_err(|_| WorkerError::ChannelClosed)
    }
}

pub struct WorkerPool {
    queue: JobQueue,
    result_receiver: Receiver<JobResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` threads sharing one pipeline.
    pub fn new(pipeline: Arc<Pipeline>, worker_count: usize) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::SpawnFailed(
                "worker_count must be greater than zero".to_string(),
            ));
        }

        let (job_sender, job_receiver) = unbounded::<Job>();
        let (result_sender, result_receiver) = unbounded::<JobResult>();
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);

            let handle = thread::Builder::new()
                .name(format!("smeta-worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, job_rx, result_tx, shutdown_flag, worker_pipeline);
                })
                .map_err(|e| WorkerError::SpawnFailed(e.to_string()))?;

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Ok(Self {
            queue: JobQueue {
                sender: job_sender,
                shutdown: Arc::clone(&shutdown),
            },
            result_receiver,
            workers,
            shutdown,
        })
    }

    pub fn queue(&self) -> JobQueue {
        self.queue.clone()
    }

    /// Receiving side of finished jobs, for a drain loop.
    pub fn results(&self) -> Receiver<JobResult> {
        self.result_receiver.clone()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Joins all workers. Jobs still queued are dropped, which removes their
    /// scratch inputs; their records stay pending until reconciliation.
    pub fn wait(self) {
        self.shutdown.store(true, Ordering::Relaxed);
        drop(self.queue);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<Job>,
    result_sender: Sender<JobResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<Pipeline>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match job_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(job) => {
                debug!("Worker {} processing request {}", worker_id, job.request_id);
                let request_id = job.request_id.clone();

                let result = panic::catch_unwind(AssertUnwindSafe(|| pipeline.run(job)))
                    .unwrap_or_else(|_| recover_from_panic(&pipeline, &request_id));

                if let Err(e) = result_sender.send(result) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} job channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

fn recover_from_panic(pipeline: &Pipeline, request_id: &str) -> JobResult {
    let message = "Pipeline run panicked".to_string();
    error!("Request {}: {}", request_id, message);
    if let Err(e) = pipeline.store().complete_error(request_id, None, &message) {
        error!("Failed to record panic for request {}: {}", request_id, e);
    }
    JobResult::failure(request_id, Default::default(), message)
}
