//! # Simulation Worker
//!
//! A [`Worker`] owns one engine and runs it on its own thread between
//! `start` and `stop`. While idle the engine sits in the worker; while running
//! it is moved into the thread and handed back through the `JoinHandle` when
//! the loop ends, so configuration and the rollout loop can never touch the
//! engine at the same time.
//!
//! ## Loop
//! ```text
//! while !stop_flag {
//!     samples = engine.advance_batch(plies, batch_size)   // errors swallowed
//!     stats.write().record(samples)                       // one lock per batch
//!     progress.add(batch_size)                            // after stats land
//! }
//! ```
//! The flag is only checked between batches, so a batch is never cut short.

use crate::engine::{RolloutError, RolloutSample, SimulationEngine};
use crate::error::SimError;
use crate::progress::ProgressCounter;
use crate::types::{CandidateMove, Position, Rack, SimSetup};
use log::{debug, trace, warn};
use parking_lot::RwLock;
use sim_stats::CandidateStatistics;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Per-candidate statistics of one worker, indexed like the candidate list.
///
/// Written only by the worker's thread, read by the pool during reduction.
pub type StatsTable = Arc<RwLock<Vec<CandidateStatistics>>>;

/// State the loop shares with its worker.
struct LoopContext {
    id: usize,
    plies: u32,
    batch_size: u32,
    limit: Option<u64>,
    stop_flag: Arc<AtomicBool>,
    stats: StatsTable,
    batches: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    progress: Arc<ProgressCounter>,
}

pub struct Worker<E: SimulationEngine> {
    id: usize,
    batch_size: u32,
    engine: Option<E>,
    handle: Option<JoinHandle<E>>,
    stop_flag: Arc<AtomicBool>,
    stats: StatsTable,
    position: Position,
    candidates: Vec<CandidateMove>,
    batches: Arc<AtomicU64>,
    failed: Arc<AtomicU64>,
    progress: Arc<ProgressCounter>,
}

impl<E: SimulationEngine> Worker<E> {
    pub fn new(id: usize, engine: E, batch_size: u32, progress: Arc<ProgressCounter>) -> Self {
        let position = engine.position().clone();
        let candidates = engine.candidates().to_vec();
        let stats = Arc::new(RwLock::new(vec![CandidateStatistics::new(); candidates.len()]));
        Self {
            id,
            batch_size,
            engine: Some(engine),
            handle: None,
            stop_flag: Arc::new(AtomicBool::new(false)),
            stats,
            position,
            candidates,
            batches: Arc::new(AtomicU64::new(0)),
            failed: Arc::new(AtomicU64::new(0)),
            progress,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// True while the loop thread has not returned.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// True once the engine was lost to a panic. A lost worker is left out of
    /// every broadcast, run and reduction.
    pub fn is_lost(&self) -> bool {
        self.handle.is_none() && self.engine.is_none()
    }

    /// The position this worker was last configured with.
    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn candidates(&self) -> &[CandidateMove] {
        &self.candidates
    }

    /// Batches completed since the last reset, failed ones included.
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn failed_batches(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Consistent copy of the statistics table. Safe while the loop runs.
    pub fn statistics_snapshot(&self) -> Vec<CandidateStatistics> {
        self.stats.read().clone()
    }

    /// Replaces position, rack, candidate restriction and opponent
    /// constraints, and clears the statistics.
    pub fn configure(&mut self, setup: &SimSetup) -> Result<(), SimError> {
        let engine = self.engine_mut("configure the worker")?;
        engine.set_position(&setup.position);
        if let Some(rack) = &setup.rack {
            engine.set_current_player_rack(rack);
        }
        engine.set_included_moves(&setup.included_moves);
        engine.set_ignore_opponents(setup.opponents.ignore_opponents);
        engine.set_partial_opponent_rack(setup.opponents.partial_rack.as_ref().unwrap_or(&Rack::default()));
        engine.reset_statistics();
        self.refresh();
        self.clear_statistics();
        Ok(())
    }

    /// Applies one change to the idle engine. Returns whether the candidate
    /// list changed, in which case the statistics are cleared.
    pub fn update<F>(&mut self, what: &str, change: F) -> Result<bool, SimError>
    where
        F: FnOnce(&mut E),
    {
        change(self.engine_mut(what)?);
        let before = std::mem::take(&mut self.candidates);
        self.refresh();
        let changed = before != self.candidates;
        if changed {
            self.clear_statistics();
        }
        Ok(changed)
    }

    /// Clears accumulated statistics, keeping position and candidates.
    pub fn reset_statistics(&mut self) -> Result<(), SimError> {
        self.engine_mut("reset statistics")?.reset_statistics();
        self.clear_statistics();
        Ok(())
    }

    /// Starts an open-ended loop. Returns `false` if it was already running.
    pub fn start(&mut self, plies: u32) -> Result<bool, SimError> {
        self.launch(plies, None)
    }

    /// Starts a loop that also ends on its own after `batches` batches.
    pub fn start_bounded(&mut self, plies: u32, batches: u64) -> Result<bool, SimError> {
        self.launch(plies, Some(batches))
    }

    fn launch(&mut self, plies: u32, limit: Option<u64>) -> Result<bool, SimError> {
        if self.is_running() {
            warn!("Worker {} is already running; ignoring start", self.id);
            return Ok(false);
        }
        self.join()?;
        let engine = self.engine.take().ok_or(SimError::WorkerPanicked(self.id))?;
        self.stop_flag.store(false, Ordering::Release);

        let ctx = LoopContext {
            id: self.id,
            plies,
            batch_size: self.batch_size,
            limit,
            stop_flag: self.stop_flag.clone(),
            stats: self.stats.clone(),
            batches: self.batches.clone(),
            failed: self.failed.clone(),
            progress: self.progress.clone(),
        };
        self.handle = Some(thread::spawn(move || run_loop(engine, ctx)));
        Ok(true)
    }

    /// Asks the loop to finish its current batch and exit. Does not wait.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Release);
    }

    /// Requests a stop and waits for the loop to exit.
    pub fn stop(&mut self) -> Result<(), SimError> {
        self.request_stop();
        self.join()
    }

    /// Waits for the loop to exit on its own and takes the engine back.
    pub fn join(&mut self) -> Result<(), SimError> {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(engine) => {
                    debug!("Worker {} joined after {} batches", self.id, self.batches());
                    self.engine = Some(engine);
                }
                Err(_) => {
                    warn!("Worker {} panicked; its engine is lost", self.id);
                    self.candidates.clear();
                    self.clear_statistics();
                    return Err(SimError::WorkerPanicked(self.id));
                }
            }
        }
        Ok(())
    }

    fn engine_mut(&mut self, what: &str) -> Result<&mut E, SimError> {
        if self.is_running() {
            return Err(SimError::running(what));
        }
        self.join()?;
        self.engine.as_mut().ok_or(SimError::WorkerPanicked(self.id))
    }

    fn refresh(&mut self) {
        if let Some(engine) = &self.engine {
            self.position = engine.position().clone();
            self.candidates = engine.candidates().to_vec();
        }
    }

    fn clear_statistics(&mut self) {
        *self.stats.write() = vec![CandidateStatistics::new(); self.candidates.len()];
        self.batches.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}

impl<E: SimulationEngine> Drop for Worker<E> {
    fn drop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop<E: SimulationEngine>(mut engine: E, ctx: LoopContext) -> E {
    let mut done = 0u64;
    while !ctx.stop_flag.load(Ordering::Acquire) {
        if ctx.limit.is_some_and(|limit| done >= limit) {
            break;
        }
        let outcome = engine
            .advance_batch(ctx.plies, ctx.batch_size)
            .and_then(|samples| record(&ctx.stats, &samples));
        if let Err(e) = outcome {
            trace!("Worker {}: batch {} failed: {}", ctx.id, done, e);
            ctx.failed.fetch_add(1, Ordering::Relaxed);
        }
        done += 1;
        ctx.batches.fetch_add(1, Ordering::Relaxed);
        ctx.progress.add(ctx.id, ctx.batch_size as u64);
    }
    debug!("Worker {} ending simulation after {} batches", ctx.id, done);
    engine
}

/// Folds a batch into the table under a single write lock. Samples for
/// unknown candidates are dropped and reported after the rest are applied.
fn record(stats: &StatsTable, samples: &[RolloutSample]) -> Result<(), RolloutError> {
    let mut table = stats.write();
    let mut unknown = None;
    for sample in samples {
        match table.get_mut(sample.candidate) {
            Some(entry) => entry.record(sample.equity, sample.win),
            None => unknown = Some(sample.candidate),
        }
    }
    match unknown {
        Some(index) => Err(RolloutError::UnknownCandidate(index)),
        None => Ok(()),
    }
}
