//! Pool-wide rollout counter and progress notifications.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// Sent after every finished batch of every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Worker that finished the batch.
    pub worker: usize,
    /// Rollouts that batch added.
    pub delta: u64,
    /// Pool-wide rollouts since the last configuration, start or reset.
    pub total: u64,
}

/// The one value written by several worker threads at once.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    total: AtomicU64,
    listeners: Mutex<Vec<Sender<ProgressEvent>>>,
    /// Mirrors `listeners.len()` so batches skip the lock when nobody listens.
    subscribed: AtomicUsize,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.total.store(0, Ordering::Release);
    }

    /// Adds a worker's batch and notifies subscribers. Returns the new total.
    pub fn add(&self, worker: usize, delta: u64) -> u64 {
        let total = self.total.fetch_add(delta, Ordering::AcqRel) + delta;
        if self.subscribed.load(Ordering::Acquire) > 0 {
            let event = ProgressEvent { worker, delta, total };
            let mut listeners = self.listeners.lock();
            listeners.retain(|tx| tx.send(event).is_ok());
            self.subscribed.store(listeners.len(), Ordering::Release);
        }
        total
    }

    /// Opens a new progress channel. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel();
        let mut listeners = self.listeners.lock();
        listeners.push(tx);
        self.subscribed.store(listeners.len(), Ordering::Release);
        rx
    }

    pub fn subscribers(&self) -> usize {
        self.subscribed.load(Ordering::Acquire)
    }
}
