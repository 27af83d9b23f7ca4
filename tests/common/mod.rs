//! Deterministic engine shared by the integration tests.

#![allow(dead_code)]

use simpool::{CandidateMove, Position, Rack, RolloutError, RolloutSample, SimulationEngine};
use std::time::Duration;

/// Every rollout of candidate `i` yields `outcomes[i]` as (equity, win).
pub struct ScriptedEngine {
    position: Position,
    candidates: Vec<CandidateMove>,
    outcomes: Vec<(f64, f64)>,
    samples_per_batch: Option<u32>,
    fail_every: Option<u64>,
    delay: Option<Duration>,
    diverge_above: Option<usize>,
    diverge_on_restrict: bool,
    panics: bool,
    batches: u64,
}

impl ScriptedEngine {
    pub fn new(outcomes: Vec<(f64, f64)>) -> Self {
        Self {
            position: Position::default(),
            candidates: Vec::new(),
            outcomes,
            samples_per_batch: None,
            fail_every: None,
            delay: None,
            diverge_above: None,
            diverge_on_restrict: false,
            panics: false,
            batches: 0,
        }
    }

    /// Ignores the requested rollout count and records `n` samples per candidate.
    pub fn samples_per_batch(mut self, n: u32) -> Self {
        self.samples_per_batch = Some(n);
        self
    }

    /// Every `n`th batch fails without producing samples.
    pub fn failing_every(mut self, n: u64) -> Self {
        self.fail_every = Some(n);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Generates one candidate fewer than the position lists.
    pub fn diverging(self) -> Self {
        self.diverging_above(0)
    }

    /// Drops the last candidate only for positions listing more than `n` moves.
    pub fn diverging_above(mut self, n: usize) -> Self {
        self.diverge_above = Some(n);
        self
    }

    /// Drops the last candidate whenever the candidates are restricted.
    pub fn diverging_on_restrict(mut self) -> Self {
        self.diverge_on_restrict = true;
        self
    }

    /// Panics in the first batch.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }
}

impl SimulationEngine for ScriptedEngine {
    fn set_position(&mut self, position: &Position) {
        self.position = position.clone();
        self.candidates = position.moves.clone();
        if self.diverge_above.is_some_and(|n| self.candidates.len() > n) {
            self.candidates.pop();
        }
    }

    fn position(&self) -> &Position {
        &self.position
    }

    fn set_current_player_rack(&mut self, rack: &Rack) {
        self.position.set_current_rack(rack.clone());
    }

    fn set_included_moves(&mut self, moves: &[CandidateMove]) {
        for candidate in &mut self.candidates {
            candidate.excluded = !moves.is_empty() && !moves.iter().any(|m| m.same_play(candidate));
        }
        if self.diverge_on_restrict && !moves.is_empty() {
            self.candidates.pop();
        }
    }

    fn set_ignore_opponents(&mut self, _ignore: bool) {}

    fn set_partial_opponent_rack(&mut self, _rack: &Rack) {}

    fn candidates(&self) -> &[CandidateMove] {
        &self.candidates
    }

    fn advance_batch(&mut self, _plies: u32, rollouts: u32) -> Result<Vec<RolloutSample>, RolloutError> {
        self.batches += 1;
        if self.panics {
            panic!("scripted engine panic");
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail_every.is_some_and(|n| self.batches % n == 0) {
            return Err(RolloutError::Engine(String::from("scripted failure")));
        }
        let per_candidate = self.samples_per_batch.unwrap_or(rollouts);
        let mut samples = Vec::new();
        for (index, candidate) in self.candidates.iter().enumerate() {
            if candidate.excluded {
                continue;
            }
            let (equity, win) = self.outcomes.get(index).copied().unwrap_or((0.0, 0.0));
            for _ in 0..per_candidate {
                samples.push(RolloutSample::new(index, equity, win));
            }
        }
        Ok(samples)
    }

    fn reset_statistics(&mut self) {
        self.batches = 0;
    }
}

pub fn two_moves() -> Vec<CandidateMove> {
    vec![
        CandidateMove::new("8H QUA", "QUA", 24),
        CandidateMove::new("8D QUACK", "QUACK", 42),
    ]
}

pub fn position(moves: Vec<CandidateMove>) -> Position {
    Position::two_player("QUACKLE".parse().unwrap(), Rack::default(), moves)
}
