use std::io;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use amulet_core::Outcome;
use amulet_logging::{amulet_debug, amulet_error, amulet_info, amulet_warn};
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::classify::Classifier;
use crate::types::ClassifiedPost;

/// Queue slots per worker.
pub const DEFAULT_QUEUE_DEPTH_PER_WORKER: usize = 100;

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub worker_count: usize,
    pub queue_depth_per_worker: usize,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            worker_count: thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            queue_depth_per_worker: DEFAULT_QUEUE_DEPTH_PER_WORKER,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is closed")]
    Closed,
    #[error("failed to spawn classifier worker: {0}")]
    Spawn(#[from] io::Error),
}

/// Bounded work queue feeding a fixed pool of classifier threads.
///
/// `submit` blocks while the queue is full, so a fast source is slowed down
/// instead of losing posts. Workers forward every verdict to the state owner
/// over `events`; they never touch the store themselves.
pub struct Dispatcher {
    queue: Mutex<Option<Sender<String>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    capacity: usize,
    worker_count: usize,
}

impl Dispatcher {
    pub fn start(
        classifier: Arc<dyn Classifier>,
        settings: &DispatcherSettings,
        events: mpsc::Sender<ClassifiedPost>,
    ) -> Result<Self, DispatchError> {
        let worker_count = settings.worker_count.max(1);
        let capacity = worker_count * settings.queue_depth_per_worker.max(1);
        let (tx, rx) = crossbeam_channel::bounded::<String>(capacity);

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let rx = rx.clone();
            let classifier = classifier.clone();
            let events = events.clone();
            let handle = thread::Builder::new()
                .name(format!("classifier-{worker_id}"))
                .spawn(move || run_worker(worker_id, rx, classifier.as_ref(), events))?;
            workers.push(handle);
        }

        amulet_info!(
            "Dispatcher started: {} workers, queue capacity {}",
            worker_count,
            capacity
        );

        Ok(Self {
            queue: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            capacity,
            worker_count,
        })
    }

    /// Enqueue one post for classification, blocking while the queue is full.
    pub fn submit(&self, text: impl Into<String>) -> Result<(), DispatchError> {
        // Clone the sender so a blocked submit never holds the lock `close` needs.
        let tx = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(DispatchError::Closed)?;
        tx.send(text.into()).map_err(|_| DispatchError::Closed)
    }

    /// Stop accepting posts, let workers drain the queue, and join them.
    ///
    /// Blocks until every worker has exited. Safe to call more than once.
    pub fn close(&self) {
        let tx = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if tx.is_none() {
            return;
        }
        drop(tx);

        let workers = std::mem::take(
            &mut *self
                .workers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for handle in workers {
            let name = handle.thread().name().unwrap_or("classifier").to_string();
            if handle.join().is_err() {
                amulet_error!("Worker {} panicked", name);
            }
        }
        amulet_info!("Dispatcher closed");
    }

    pub fn is_closed(&self) -> bool {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Posts waiting in the queue.
    pub fn queue_len(&self) -> usize {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(0, Sender::len)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }
}

fn run_worker(
    worker_id: usize,
    queue: Receiver<String>,
    classifier: &dyn Classifier,
    events: mpsc::Sender<ClassifiedPost>,
) {
    amulet_debug!("Worker {} started", worker_id);
    // Ends once the queue is closed and empty.
    for text in queue.iter() {
        let outcome = match classifier.classify(&text) {
            Ok(Some(rarity)) => Outcome::Match(rarity),
            Ok(None) => Outcome::NoMatch,
            Err(err) => {
                amulet_warn!("Worker {} skipped a post: {}", worker_id, err);
                Outcome::Failed
            }
        };
        let post = ClassifiedPost {
            text,
            outcome,
            observed_at: Utc::now(),
        };
        if events.blocking_send(post).is_err() {
            amulet_warn!("Worker {}: state owner is gone, stopping", worker_id);
            break;
        }
    }
    amulet_debug!("Worker {} stopped", worker_id);
}
