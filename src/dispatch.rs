/// Site sharding across worker threads.
///
/// Every site hashes to exactly one worker, and each worker owns its own
/// `Orchestrator`, so readings for a site are applied serially in the order
/// they were submitted while different sites proceed in parallel. Workers
/// share nothing mutable; the risk model inside each orchestrator is an
/// `Arc` to the same read-only instance.

use chrono::{DateTime, Utc};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use crate::logging::{self, Component};
use crate::model::{AlertRecord, FloodError, RawReading};
use crate::pipeline::{IngestOutcome, Orchestrator};

enum Command {
    Ingest(RawReading),
    Sweep(DateTime<Utc>),
    Shutdown,
}

/// Results flowing back from the workers.
#[derive(Debug)]
pub enum WorkerEvent {
    Ingested {
        worker: usize,
        result: Result<IngestOutcome, FloodError>,
    },
    Swept {
        worker: usize,
        records: Vec<AlertRecord>,
    },
}

/// Worker index for a site. FNV-1a over the trimmed id, so the mapping is
/// the same on every run.
pub fn shard_for(site_id: &str, workers: usize) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in site_id.trim().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % workers.max(1) as u64) as usize
}

pub struct Dispatcher {
    senders: Vec<Sender<Command>>,
    handles: Vec<JoinHandle<()>>,
    events: Receiver<WorkerEvent>,
}

impl Dispatcher {
    /// Starts `workers` threads. `build(i)` constructs (and typically
    /// restores) the orchestrator for worker `i` on the calling thread, so a
    /// configuration or storage failure aborts startup before any thread runs.
    pub fn start<F>(workers: usize, mut build: F) -> Result<Self, FloodError>
    where
        F: FnMut(usize) -> Result<Orchestrator, FloodError>,
    {
        let workers = workers.max(1);
        let mut orchestrators = Vec::with_capacity(workers);
        for i in 0..workers {
            orchestrators.push(build(i)?);
        }

        let (event_tx, events) = mpsc::channel();
        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);

        for (i, orchestrator) in orchestrators.into_iter().enumerate() {
            let (tx, rx) = mpsc::channel();
            let event_tx = event_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("site-worker-{}", i))
                .spawn(move || run_worker(i, orchestrator, rx, event_tx))
                .map_err(|e| {
                    FloodError::Configuration(format!("cannot start worker {}: {}", i, e))
                })?;
            senders.push(tx);
            handles.push(handle);
        }

        logging::info(
            Component::Pipeline,
            None,
            &format!("dispatcher started with {} workers", workers),
        );
        Ok(Self { senders, handles, events })
    }

    pub fn workers(&self) -> usize {
        self.senders.len()
    }

    /// Queues a reading on the worker that owns its site.
    pub fn submit(&self, raw: RawReading) -> Result<(), FloodError> {
        let worker = shard_for(&raw.site_id, self.senders.len());
        self.senders[worker]
            .send(Command::Ingest(raw))
            .map_err(|_| FloodError::Transport(format!("worker {} has stopped", worker)))
    }

    /// Asks every worker to run a staleness sweep at `now`.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<(), FloodError> {
        for (worker, tx) in self.senders.iter().enumerate() {
            tx.send(Command::Sweep(now))
                .map_err(|_| FloodError::Transport(format!("worker {} has stopped", worker)))?;
        }
        Ok(())
    }

    /// Events produced so far, without blocking.
    pub fn drain(&self) -> Vec<WorkerEvent> {
        self.events.try_iter().collect()
    }

    /// Stops all workers after their queues empty and returns every event
    /// not yet drained.
    pub fn shutdown(self) -> Vec<WorkerEvent> {
        for tx in &self.senders {
            // A worker that already exited has nothing left to flush.
            let _ = tx.send(Command::Shutdown);
        }
        for (i, handle) in self.handles.into_iter().enumerate() {
            if handle.join().is_err() {
                logging::error(
                    Component::Pipeline,
                    None,
                    &format!("worker {} panicked", i),
                );
            }
        }
        self.events.try_iter().collect()
    }
}

fn run_worker(
    worker: usize,
    mut orchestrator: Orchestrator,
    commands: Receiver<Command>,
    events: Sender<WorkerEvent>,
) {
    while let Ok(command) = commands.recv() {
        let event = match command {
            Command::Ingest(raw) => WorkerEvent::Ingested {
                worker,
                result: orchestrator.ingest(&raw),
            },
            Command::Sweep(now) => WorkerEvent::Swept {
                worker,
                records: orchestrator.sweep_stale(now),
            },
            Command::Shutdown => break,
        };
        if events.send(event).is_err() {
            break;
        }
    }
    logging::debug(
        Component::Pipeline,
        None,
        &format!("worker {} stopped", worker),
    );
}
