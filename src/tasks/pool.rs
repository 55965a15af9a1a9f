// Copyright (C) 2026  Caprica Software Limited
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Bounded pool of download worker threads.
//!
//! Jobs are pulled from a shared queue by a fixed number of threads. Each
//! worker reports back over a single result channel, first when it starts a
//! job and again when the job settles, so the collecting side can bound how
//! long it waits for any one download.
//!
//! A worker stuck in a download can be retired. It is replaced at once and
//! exits as soon as its download returns, so the pool keeps its size.
//!
//! Workers never touch the download history, they only report outcomes.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread,
    time::Duration,
};

use tracing::{debug, warn};

use crate::client::{CatalogClient, ClientResult, Quality};

/// A single track download.
#[derive(Debug, Clone)]
pub(crate) struct DownloadJob {
    /// Run-wide sequence number, used to match results to jobs.
    pub seq: usize,
    pub track_id: u64,
    pub destination: PathBuf,
}

#[derive(Debug)]
pub(crate) enum WorkerMessage {
    Started {
        seq: usize,
        worker: usize,
    },
    Finished {
        seq: usize,
        result: ClientResult<PathBuf>,
    },
    /// The job was dequeued after cancellation and never run.
    Cancelled {
        seq: usize,
    },
}

pub(crate) struct WorkerPool {
    job_tx: crossbeam_channel::Sender<DownloadJob>,
    job_rx: crossbeam_channel::Receiver<DownloadJob>,
    result_tx: Sender<WorkerMessage>,
    result_rx: Receiver<WorkerMessage>,
    client: Arc<dyn CatalogClient>,
    quality: Quality,
    cancel: Arc<AtomicBool>,
    /// Retirement flag of every live worker, by worker number.
    workers: HashMap<usize, Arc<AtomicBool>>,
    next_worker: usize,
}

impl WorkerPool {
    /// Spawns `size` worker threads (at least one).
    ///
    /// Threads exit once the pool is dropped and the queue drains. A worker
    /// stuck in a download is never joined.
    pub(crate) fn spawn(
        size: usize,
        client: Arc<dyn CatalogClient>,
        quality: Quality,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<DownloadJob>();
        let (result_tx, result_rx) = mpsc::channel();

        let mut pool = Self {
            job_tx,
            job_rx,
            result_tx,
            result_rx,
            client,
            quality,
            cancel,
            workers: HashMap::new(),
            next_worker: 0,
        };

        for _ in 0..size.max(1) {
            pool.spawn_worker();
        }

        pool
    }

    fn spawn_worker(&mut self) {
        let n = self.next_worker;
        self.next_worker += 1;

        let job_rx = self.job_rx.clone();
        let result_tx = self.result_tx.clone();
        let client = Arc::clone(&self.client);
        let cancel = Arc::clone(&self.cancel);
        let quality = self.quality;
        let retired = Arc::new(AtomicBool::new(false));
        let worker_retired = Arc::clone(&retired);

        let spawned = thread::Builder::new()
            .name(format!("download-{n}"))
            .spawn(move || {
                let worker = Worker {
                    id: n,
                    client: client.as_ref(),
                    quality,
                    cancel: &cancel,
                    retired: &worker_retired,
                };
                worker.run(job_rx, result_tx);
            });

        match spawned {
            Ok(_) => {
                self.workers.insert(n, retired);
            }
            Err(e) => warn!("Failed to spawn download worker {}: {}", n, e),
        }
    }

    /// Gives up on `worker` and starts a fresh thread in its place.
    ///
    /// The retired thread finishes the download it is stuck in, reports it
    /// and exits without taking another job.
    pub(crate) fn replace_worker(&mut self, worker: usize) {
        if let Some(retired) = self.workers.remove(&worker) {
            retired.store(true, Ordering::SeqCst);
            debug!("Retired download worker {}", worker);
            self.spawn_worker();
        }
    }

    /// Queues a job. Returns `false` if no worker is left to run it.
    pub(crate) fn submit(&self, job: DownloadJob) -> bool {
        !self.workers.is_empty() && self.job_tx.send(job).is_ok()
    }

    /// Waits up to `timeout` for the next message from any worker.
    pub(crate) fn next_message(
        &self,
        timeout: Duration,
    ) -> Result<WorkerMessage, RecvTimeoutError> {
        self.result_rx.recv_timeout(timeout)
    }
}

struct Worker<'a> {
    id: usize,
    client: &'a dyn CatalogClient,
    quality: Quality,
    cancel: &'a AtomicBool,
    retired: &'a AtomicBool,
}

impl Worker<'_> {
    fn run(
        &self,
        job_rx: crossbeam_channel::Receiver<DownloadJob>,
        result_tx: Sender<WorkerMessage>,
    ) {
        while !self.retired.load(Ordering::SeqCst) {
            let Ok(job) = job_rx.recv() else {
                break;
            };
            let seq = job.seq;

            if self.cancel.load(Ordering::SeqCst) {
                if result_tx.send(WorkerMessage::Cancelled { seq }).is_err() {
                    break;
                }
                continue;
            }

            let started = WorkerMessage::Started {
                seq,
                worker: self.id,
            };
            if result_tx.send(started).is_err() {
                break;
            }

            let result = self.run_job(&job);

            if result_tx.send(WorkerMessage::Finished { seq, result }).is_err() {
                break;
            }
        }
    }

    /// Downloads one track into its destination directory.
    ///
    /// Several workers may target the same directory at once, creating it is
    /// idempotent.
    fn run_job(&self, job: &DownloadJob) -> ClientResult<PathBuf> {
        fs::create_dir_all(&job.destination)?;
        self.client
            .download_track(job.track_id, &job.destination, self.quality)
    }
}
