//! # Simulation Engine Boundary
//!
//! The worker pool does not know how a rollout is played. It drives any type
//! implementing [`SimulationEngine`]: one instance per worker, each owning its
//! own copy of the position and candidate list.
//!
//! Engines report each finished rollout as a [`RolloutSample`]; the worker
//! folds those samples into its statistics table. Keeping the accumulation in
//! the worker means engines need no synchronisation of their own.

use crate::types::{CandidateMove, Position, Rack};
use thiserror::Error;

/// Outcome of one rollout for one candidate move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RolloutSample {
    /// Index into the engine's candidate list.
    pub candidate: usize,
    pub equity: f64,
    /// 1.0 for a win, 0.5 for a tie, 0.0 for a loss.
    pub win: f64,
}

impl RolloutSample {
    pub fn new(candidate: usize, equity: f64, win: f64) -> Self {
        Self { candidate, equity, win }
    }
}

/// Why an engine could not finish a batch.
///
/// Workers swallow these: the batch contributes whatever samples it produced
/// (possibly none) and the loop carries on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RolloutError {
    #[error("no legal continuation from this position")]
    NoContinuation,

    #[error("bag holds {available} tiles but {needed} are needed")]
    BagExhausted { needed: usize, available: usize },

    #[error("sample refers to candidate {0}, which is not in the candidate list")]
    UnknownCandidate(usize),

    #[error("engine failure: {0}")]
    Engine(String),
}

/// A rollout engine owned by exactly one worker.
///
/// `candidates()` must keep its length and order between configuration
/// calls; the pool reduces statistics across workers by candidate index.
pub trait SimulationEngine: Send + 'static {
    /// Replaces the position and regenerates the candidate list from it.
    fn set_position(&mut self, position: &Position);

    fn position(&self) -> &Position;

    /// Changes the rack of the player on turn without regenerating candidates.
    fn set_current_player_rack(&mut self, rack: &Rack);

    /// Restricts simulation to the given moves. An empty list lifts the
    /// restriction. Restricted-out candidates stay in the list, flagged
    /// `excluded`.
    fn set_included_moves(&mut self, moves: &[CandidateMove]);

    /// When set, opponents pass every turn during rollouts.
    fn set_ignore_opponents(&mut self, ignore: bool);

    /// Tiles known to be on the opponent's rack (e.g. after a revealed exchange).
    fn set_partial_opponent_rack(&mut self, rack: &Rack);

    /// Ordered candidate list with the `excluded` flag per entry.
    fn candidates(&self) -> &[CandidateMove];

    /// Plays `rollouts` rollouts of every non-excluded candidate, looking
    /// `plies` turns ahead.
    fn advance_batch(&mut self, plies: u32, rollouts: u32) -> Result<Vec<RolloutSample>, RolloutError>;

    /// Clears anything the engine accumulates across batches.
    fn reset_statistics(&mut self) {}
}
