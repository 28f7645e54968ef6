//! The destructor pool: a handful of worker threads that do exactly one
//! thing, drop values the event loop hands them by move.
//!
//! The queue is bounded, so a flood of teardown work applies backpressure
//! to the loop rather than growing without limit; tasks are never dropped.

use crossbeam_channel::{Receiver, Sender};
use std::thread::JoinHandle;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

const QUEUE_CAPACITY: usize = 1024;

pub struct ThreadPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(workers: usize) -> Self {
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(QUEUE_CAPACITY);
        let workers = (0..workers)
            .map(|i| {
                let receiver: Receiver<Job> = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("zedis_worker_{i}"))
                    .spawn(move || {
                        while let Ok(job) = receiver.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();
        ThreadPool {
            sender: Some(sender),
            workers,
        }
    }

    /// Run `job` on a worker thread. Blocks if the queue is full.
    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(sender) = &self.sender {
            // send only fails after shutdown started, which means the
            // pool handle outlived join; run the job on this thread.
            if let Err(rejected) = sender.send(Box::new(job)) {
                debug!("pool is shut down, running task inline");
                (rejected.into_inner())();
            }
        }
    }

    /// Close the queue and wait for every worker to finish its backlog.
    pub fn join(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.join();
    }
}
