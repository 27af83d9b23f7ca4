//! # Worker Pool - Fan-Out / Fan-In Coordinator
//!
//! [`WorkerPool`] is the only type callers talk to. It broadcasts identical
//! configuration and start/stop commands to every [`Worker`], keeps the
//! pool-wide rollout counter, and reduces every worker's per-candidate
//! statistics into one ranked move list.
//!
//! ## Lifecycle
//! ```text
//!            configure            start               stop
//!   Idle ───────────────► Configured ─────► Running ─────────► Stopped
//!                              ▲                                  │
//!                              └──────────── configure ───────────┘
//! ```
//! `combined_moves` and `progress` may be called in any state, including
//! while the workers run; they then observe a live snapshot.
//!
//! ## Candidate order
//! Reduction pairs up statistics by candidate index, so every broadcast ends
//! by checking that all workers report the same candidate list. A broadcast
//! that fails part way leaves the workers disagreeing, so the pool drops back
//! to `Idle` and refuses to start until it is configured again.
//!
//! ## Lost workers
//! A worker whose engine panicked is reported once through `stop`/`wait` and
//! then left out of broadcasts, runs and reductions. The others carry on.

use crate::config::PoolConfig;
use crate::engine::SimulationEngine;
use crate::error::SimError;
use crate::progress::{ProgressCounter, ProgressEvent};
use crate::types::{CandidateMove, CombinedMove, Position, RankBy, Rack, SimSetup};
use crate::worker::Worker;
use log::{debug, info, warn};
use sim_stats::CandidateStatistics;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Idle,
    Configured,
    Running,
    Stopped,
}

pub struct WorkerPool<E: SimulationEngine> {
    workers: Vec<Worker<E>>,
    config: PoolConfig,
    progress: Arc<ProgressCounter>,
    candidates: Vec<CandidateMove>,
    state: PoolState,
}

impl<E: SimulationEngine> WorkerPool<E> {
    /// Creates one idle worker per configured thread. `factory` builds the
    /// engine for each worker index.
    pub fn new<F>(config: PoolConfig, mut factory: F) -> Result<Self, SimError>
    where
        F: FnMut(usize) -> E,
    {
        if config.batch_size == 0 {
            return Err(SimError::InvalidBatchSize);
        }
        let count = config.resolved_workers();
        if count == 0 {
            return Err(SimError::EmptyPool);
        }
        info!("Will create {} simulation workers", count);

        let progress = Arc::new(ProgressCounter::new());
        let workers: Vec<Worker<E>> = (0..count)
            .map(|id| Worker::new(id, factory(id), config.batch_size, progress.clone()))
            .collect();
        let mut pool = Self {
            workers,
            config,
            progress,
            candidates: Vec::new(),
            state: PoolState::Idle,
        };
        pool.verify_candidates()?;
        Ok(pool)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    /// True while any worker loop is still alive.
    pub fn is_running(&self) -> bool {
        self.workers.iter().any(Worker::is_running)
    }

    /// Rollouts completed by all workers since the last configure, start or reset.
    pub fn progress(&self) -> u64 {
        self.progress.total()
    }

    pub fn has_results(&self) -> bool {
        self.progress() > 0
    }

    /// Receives one event per batch per worker. Not throttled.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        self.progress.subscribe()
    }

    /// The candidate list shared by every worker.
    pub fn candidates(&self) -> &[CandidateMove] {
        &self.candidates
    }

    pub fn worker_statistics(&self, worker: usize) -> Option<Vec<CandidateStatistics>> {
        self.workers.get(worker).map(Worker::statistics_snapshot)
    }

    /// Workers whose engine has not been lost to a panic.
    pub fn live_workers(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_lost()).count()
    }

    pub fn failed_batches(&self) -> u64 {
        self.workers.iter().map(Worker::failed_batches).sum()
    }

    /// Broadcasts identical configuration to every worker and zeroes progress.
    pub fn configure(&mut self, setup: &SimSetup) -> Result<(), SimError> {
        self.ensure_stopped("configure the simulation")?;
        let applied = self.for_each_live(|worker| worker.configure(setup).map(|_| false));
        if let Err(e) = applied.and_then(|_| self.verify_candidates()) {
            return Err(self.invalidate(e));
        }
        self.progress.reset();
        self.state = PoolState::Configured;
        debug!(
            "Configured {} workers with {} candidates",
            self.workers.len(),
            self.candidates.len()
        );
        Ok(())
    }

    /// Starts every worker at the given depth until `stop` is called.
    pub fn start(&mut self, plies: u32) -> Result<(), SimError> {
        self.launch(plies, None)
    }

    /// Starts every worker for exactly `batches` batches each.
    pub fn start_bounded(&mut self, plies: u32, batches: u64) -> Result<(), SimError> {
        self.launch(plies, Some(batches))
    }

    fn launch(&mut self, plies: u32, limit: Option<u64>) -> Result<(), SimError> {
        match self.state {
            PoolState::Idle => return Err(SimError::NotConfigured),
            PoolState::Running if self.is_running() => {
                warn!("Simulation is already running; ignoring start");
                return Ok(());
            }
            _ => {}
        }
        self.reap();
        if self.live_workers() == 0 {
            return Err(SimError::AllWorkersLost);
        }
        self.progress.reset();
        info!(
            "Starting simulation: {} workers, {} plies, batch size {}",
            self.workers.len(),
            plies,
            self.config.batch_size
        );
        for id in 0..self.workers.len() {
            if self.workers[id].is_lost() {
                continue;
            }
            let started = match limit {
                Some(batches) => self.workers[id].start_bounded(plies, batches),
                None => self.workers[id].start(plies),
            };
            if let Err(e) = started {
                self.request_stop();
                let _ = self.join_all();
                self.state = PoolState::Stopped;
                return Err(e);
            }
        }
        self.state = PoolState::Running;
        Ok(())
    }

    /// Signals every worker to stop after its current batch. Does not wait.
    pub fn request_stop(&self) {
        for worker in &self.workers {
            worker.request_stop();
        }
    }

    /// Stops every worker and waits for all loops to exit. A no-op unless
    /// the pool is running.
    pub fn stop(&mut self) -> Result<(), SimError> {
        if self.state != PoolState::Running {
            return Ok(());
        }
        self.request_stop();
        let joined = self.join_all();
        self.state = PoolState::Stopped;
        info!("Simulation stopped after {} rollouts", self.progress());
        joined
    }

    /// Waits for bounded runs to finish without cancelling them.
    pub fn wait(&mut self) -> Result<(), SimError> {
        if self.state != PoolState::Running {
            return Ok(());
        }
        let joined = self.join_all();
        self.state = PoolState::Stopped;
        info!("Simulation finished after {} rollouts", self.progress());
        joined
    }

    fn join_all(&mut self) -> Result<(), SimError> {
        let mut first_error = None;
        for worker in &mut self.workers {
            if let Err(e) = worker.join() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Reduces every worker's statistics into one list ranked by `rank_by`.
    ///
    /// With `prune`, candidates excluded from simulation are left out. Safe to
    /// call while running; stop first for a settled result.
    pub fn combined_moves(&self, prune: bool, rank_by: RankBy) -> Vec<CombinedMove> {
        let snapshots: Vec<Vec<CandidateStatistics>> =
            self.workers.iter().map(Worker::statistics_snapshot).collect();
        reduce(&self.candidates, &snapshots, self.progress(), prune, rank_by)
    }

    /// The position held by the first live worker. Every live worker holds
    /// the same one.
    pub fn current_position(&self) -> &Position {
        self.workers
            .iter()
            .find(|w| !w.is_lost())
            .unwrap_or(&self.workers[0])
            .position()
    }

    pub fn set_current_player_rack(&mut self, rack: &Rack) -> Result<(), SimError> {
        self.broadcast("change the rack", |engine| engine.set_current_player_rack(rack))
    }

    pub fn set_included_moves(&mut self, moves: &[CandidateMove]) -> Result<(), SimError> {
        self.broadcast("restrict the candidate moves", |engine| engine.set_included_moves(moves))
    }

    pub fn set_ignore_opponents(&mut self, ignore: bool) -> Result<(), SimError> {
        self.broadcast("change opponent handling", |engine| engine.set_ignore_opponents(ignore))
    }

    pub fn set_partial_opponent_rack(&mut self, rack: &Rack) -> Result<(), SimError> {
        self.broadcast("change the opponent rack", |engine| engine.set_partial_opponent_rack(rack))
    }

    /// Zeroes progress and every worker's statistics, keeping the position
    /// and candidate list.
    pub fn reset_counters(&mut self) -> Result<(), SimError> {
        self.ensure_stopped("reset counters")?;
        self.for_each_live(|worker| worker.reset_statistics().map(|_| false))?;
        self.progress.reset();
        debug!("Reset simulation counters");
        Ok(())
    }

    fn broadcast<F>(&mut self, what: &str, change: F) -> Result<(), SimError>
    where
        F: Fn(&mut E),
    {
        self.ensure_stopped(what)?;
        let outcome = self
            .for_each_live(|worker| worker.update(what, &change))
            .and_then(|changed| self.verify_candidates().map(|_| changed));
        match outcome {
            Ok(changed) => {
                if changed {
                    self.progress.reset();
                }
                Ok(())
            }
            Err(e) => Err(self.invalidate(e)),
        }
    }

    /// Applies `apply` to every live worker, or-ing the returned flags.
    fn for_each_live<F>(&mut self, mut apply: F) -> Result<bool, SimError>
    where
        F: FnMut(&mut Worker<E>) -> Result<bool, SimError>,
    {
        self.reap();
        let mut changed = false;
        for worker in self.workers.iter_mut().filter(|w| !w.is_lost()) {
            changed |= apply(worker)?;
        }
        Ok(changed)
    }

    /// Joins finished loops so a panic from an unwaited run marks its worker
    /// lost instead of failing the next call.
    fn reap(&mut self) {
        if let Err(e) = self.join_all() {
            warn!("Continuing without a lost worker: {}", e);
        }
    }

    /// Forgets the candidate list after a failed broadcast so the pool has to
    /// be configured again before it can start.
    fn invalidate(&mut self, error: SimError) -> SimError {
        warn!("Configuration failed, pool needs a new configure: {}", error);
        self.candidates.clear();
        self.progress.reset();
        self.state = PoolState::Idle;
        error
    }

    fn ensure_stopped(&self, what: &str) -> Result<(), SimError> {
        if self.is_running() {
            Err(SimError::running(what))
        } else {
            Ok(())
        }
    }

    fn verify_candidates(&mut self) -> Result<(), SimError> {
        let mut live = self.workers.iter().filter(|w| !w.is_lost());
        let reference = live.next().ok_or(SimError::AllWorkersLost)?.candidates();
        for worker in live {
            if worker.candidates() != reference {
                return Err(SimError::CandidateMismatch {
                    worker: worker.id(),
                    expected: reference.len(),
                    found: worker.candidates().len(),
                });
            }
        }
        self.candidates = reference.to_vec();
        Ok(())
    }
}

/// Combines per-worker statistics by candidate index.
///
/// Equity and win rate are iteration-weighted means across workers, so
/// workers that have finished different numbers of batches still count in
/// proportion. With zero `progress` every statistic is left unset and the
/// engine's static equity orders the list. Sorting is stable: ties keep
/// candidate-list order.
pub fn reduce(
    candidates: &[CandidateMove],
    snapshots: &[Vec<CandidateStatistics>],
    progress: u64,
    prune: bool,
    rank_by: RankBy,
) -> Vec<CombinedMove> {
    let simulated = progress > 0;
    let mut moves: Vec<CombinedMove> = candidates
        .iter()
        .enumerate()
        .filter(|(_, candidate)| !(prune && candidate.excluded))
        .map(|(index, candidate)| {
            let mut combined = CombinedMove::unsimulated(index, candidate.clone());
            if simulated {
                let per_worker: Vec<&CandidateStatistics> =
                    snapshots.iter().filter_map(|s| s.get(index)).collect();
                let equity = sim_stats::combine(per_worker.iter().map(|s| &s.equity));
                combined.iterations = equity.count();
                combined.equity = sim_stats::weighted_mean(
                    per_worker.iter().filter_map(|s| s.equity.mean().map(|m| (m, s.equity.count()))),
                );
                combined.win_rate = sim_stats::weighted_mean(
                    per_worker.iter().filter_map(|s| s.win.mean().map(|m| (m, s.win.count()))),
                );
                combined.equity_std_dev = equity.variance().map(f64::sqrt);
            }
            combined
        })
        .collect();

    if rank_by == RankBy::Win && simulated {
        moves.sort_by(|a, b| {
            let a = a.win_rate.unwrap_or(f64::NEG_INFINITY);
            let b = b.win_rate.unwrap_or(f64::NEG_INFINITY);
            b.total_cmp(&a)
        });
    } else {
        moves.sort_by(|a, b| b.value().total_cmp(&a.value()));
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_stats::RunningStat;

    fn stats(iterations: u64, equity: f64, win: f64) -> CandidateStatistics {
        CandidateStatistics {
            equity: RunningStat::from_mean(iterations, equity),
            win: RunningStat::from_mean(iterations, win),
        }
    }

    fn candidates() -> Vec<CandidateMove> {
        vec![
            CandidateMove::new("8H QUA", "QUA", 24),
            CandidateMove::new("8D QUACK", "QUACK", 42),
        ]
    }

    #[test]
    fn test_weighted_mean_across_workers() {
        let snapshots = vec![
            vec![stats(3, 10.0, 0.2), stats(1, 0.0, 0.0)],
            vec![stats(7, 20.0, 0.6), stats(1, 0.0, 0.0)],
        ];
        let moves = reduce(&candidates(), &snapshots, 12, false, RankBy::Equity);
        assert_eq!(moves[0].index, 0);
        assert_eq!(moves[0].iterations, 10);
        assert_eq!(moves[0].equity, Some(17.0));
        let win = moves[0].win_rate.unwrap();
        assert!((win - 0.48).abs() < 1e-12);
    }

    #[test]
    fn test_no_progress_leaves_statistics_unset() {
        let snapshots = vec![vec![CandidateStatistics::new(); 2]];
        let moves = reduce(&candidates(), &snapshots, 0, false, RankBy::Win);
        assert_eq!(moves.len(), 2);
        // Static equity order: QUACK (42) before QUA (24).
        assert_eq!(moves[0].index, 1);
        assert_eq!(moves[1].index, 0);
        assert!(moves.iter().all(|m| m.equity.is_none() && m.win_rate.is_none()));
    }

    #[test]
    fn test_candidate_without_samples_is_unset() {
        let snapshots = vec![vec![stats(5, 30.0, 1.0), CandidateStatistics::new()]];
        let moves = reduce(&candidates(), &snapshots, 5, false, RankBy::Equity);
        let quack = moves.iter().find(|m| m.index == 1).unwrap();
        assert_eq!(quack.iterations, 0);
        assert_eq!(quack.equity, None);
        assert_eq!(quack.value(), 42.0);
    }

    #[test]
    fn test_rank_by_win_and_stable_ties() {
        let list = vec![
            CandidateMove::new("A", "A", 10),
            CandidateMove::new("B", "B", 10),
            CandidateMove::new("C", "C", 10),
        ];
        let snapshots = vec![vec![stats(4, 5.0, 0.5), stats(4, 1.0, 0.75), stats(4, 9.0, 0.5)]];
        let by_win = reduce(&list, &snapshots, 12, false, RankBy::Win);
        let order: Vec<usize> = by_win.iter().map(|m| m.index).collect();
        assert_eq!(order, vec![1, 0, 2]);

        let by_equity = reduce(&list, &snapshots, 12, false, RankBy::Equity);
        let order: Vec<usize> = by_equity.iter().map(|m| m.index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn test_prune_skips_excluded() {
        let mut list = candidates();
        list[1].excluded = true;
        let snapshots = vec![vec![stats(2, 1.0, 0.0), CandidateStatistics::new()]];
        let pruned = reduce(&list, &snapshots, 2, true, RankBy::Equity);
        assert_eq!(pruned.len(), 1);
        assert_eq!(pruned[0].index, 0);
        assert_eq!(reduce(&list, &snapshots, 2, false, RankBy::Equity).len(), 2);
    }

    #[test]
    fn test_short_snapshot_never_panics() {
        let snapshots = vec![vec![stats(2, 1.0, 1.0)], Vec::new()];
        let moves = reduce(&candidates(), &snapshots, 2, false, RankBy::Equity);
        assert_eq!(moves.len(), 2);
    }
}
