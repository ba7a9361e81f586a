//! Run queue: background worker threads that execute pipeline runs.
//!
//! `submit` returns a ticket immediately; workers pull tickets off an
//! `mpsc` channel in submission order. With one worker, runs never overlap.
//! With more, overlapping runs race on the same store partitions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::history::RunHistory;
use crate::pipeline::Pipeline;
use crate::summary::RunSummary;

static RUN_SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("run queue is shut down")]
    Closed,

    #[error("need at least one worker")]
    NoWorkers,

    #[error("cannot spawn worker thread: {0}")]
    Spawn(String),
}

/// Acknowledgment handed back to whoever triggered a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTicket {
    pub run_id: String,
    pub queued_at: DateTime<Utc>,
}

impl RunTicket {
    /// Fresh ticket with a process-unique run id.
    pub fn new() -> Self {
        let queued_at = Utc::now();
        let seq = RUN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        Self {
            run_id: format!("{}-{seq:04}", queued_at.format("%Y%m%dT%H%M%S%3fZ")),
            queued_at,
        }
    }
}

impl Default for RunTicket {
    fn default() -> Self {
        Self::new()
    }
}

/// Execute one ticket and persist its summary. Shared by workers and the
/// synchronous `train` path.
pub fn execute(pipeline: &Pipeline, history: Option<&RunHistory>, ticket: &RunTicket) -> RunSummary {
    let summary = pipeline.run(&ticket.run_id);
    if let Some(history) = history {
        if let Err(e) = history.append(&summary) {
            warn!(run_id = %summary.run_id, path = %history.path().display(), error = %e, "cannot append run history");
        }
    }
    summary
}

pub struct RunQueue {
    tx: Mutex<Option<Sender<RunTicket>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl RunQueue {
    pub fn start(
        pipeline: Arc<Pipeline>,
        history: Option<Arc<RunHistory>>,
        workers: usize,
    ) -> Result<Self, QueueError> {
        if workers == 0 {
            return Err(QueueError::NoWorkers);
        }
        let (tx, rx) = mpsc::channel::<RunTicket>();
        let rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx = Arc::clone(&rx);
            let pipeline = Arc::clone(&pipeline);
            let history = history.clone();
            let handle = thread::Builder::new()
                .name(format!("salescast-worker-{i}"))
                .spawn(move || worker_loop(&rx, &pipeline, history.as_deref()))
                .map_err(|e| QueueError::Spawn(e.to_string()))?;
            handles.push(handle);
        }
        info!(workers, "run queue started");

        Ok(Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
        })
    }

    /// Enqueue a run and return without waiting for it.
    pub fn submit(&self) -> Result<RunTicket, QueueError> {
        let ticket = RunTicket::new();
        let guard = self.tx.lock().unwrap_or_else(|p| p.into_inner());
        let tx = guard.as_ref().ok_or(QueueError::Closed)?;
        tx.send(ticket.clone()).map_err(|_| QueueError::Closed)?;
        info!(run_id = %ticket.run_id, "run queued");
        Ok(ticket)
    }

    /// Stop accepting runs, let queued runs finish, and join the workers.
    pub fn shutdown(&self) {
        let tx = self.tx.lock().unwrap_or_else(|p| p.into_inner()).take();
        drop(tx);
        let handles: Vec<_> = self
            .workers
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .drain(..)
            .collect();
        if handles.is_empty() {
            return;
        }
        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
        info!("run queue stopped");
    }
}

impl Drop for RunQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: &Mutex<Receiver<RunTicket>>, pipeline: &Pipeline, history: Option<&RunHistory>) {
    loop {
        // The lock is released before the run starts.
        let next = rx.lock().unwrap_or_else(|p| p.into_inner()).recv();
        match next {
            Ok(ticket) => {
                let waited = Utc::now() - ticket.queued_at;
                info!(run_id = %ticket.run_id, waited_ms = waited.num_milliseconds(), "run dequeued");
                execute(pipeline, history, &ticket);
            }
            Err(_) => break,
        }
    }
}
